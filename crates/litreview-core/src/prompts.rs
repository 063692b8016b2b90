//! Default prompt templates. Callers usually override these from files
//! named in the config; the defaults keep the pipeline usable out of the box.

/// Per-document summarization prompt.
pub const SUMMARY_PROMPT: &str = "\
You are assisting with an academic literature review. Read the attached \
paper and produce a structured summary in Markdown with these sections: \
research question, data and methodology, main findings, and relevance to \
the research theme. Be specific about variables, samples, and effect \
directions. Write 300-500 words. Do not invent content that is not in the \
paper.";

/// Final long-form draft prompt, appended after the collated summaries and
/// the research theme.
pub const DRAFT_PROMPT: &str = "\
Using only the literature summaries above, write a coherent long-form \
review of the research theme. Organize the discussion thematically rather \
than paper by paper, compare and contrast findings, point out open \
questions, and cite each work by its reference string exactly as given. \
Output Markdown.";
