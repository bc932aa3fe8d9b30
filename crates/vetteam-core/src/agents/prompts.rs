//! Instruction templates for the analyst and strategist stages.

pub fn analyst_prompt(research_data: &str) -> String {
    format!(
        "You are an Expert Data Analyst.\n\
         Analyze the following data about the Veterinary Market (2020-2025).\n\
         Summarize the key findings into a clean, professional report.\n\
         Format the output with Markdown.\n\
         \n\
         Data:\n\
         {}\n",
        research_data
    )
}

pub fn strategist_prompt(analyst_report: &str) -> String {
    format!(
        "You are a Senior Business Strategist.\n\
         Based on the following market analysis report, define a high-level Business Model Canvas\n\
         for a new startup entering this space.\n\
         \n\
         Focus on:\n\
         1. Value Propositions\n\
         2. Customer Segments\n\
         3. Revenue Streams\n\
         4. Key Activities\n\
         \n\
         Format the output with Markdown.\n\
         \n\
         Report:\n\
         {}\n",
        analyst_report
    )
}
