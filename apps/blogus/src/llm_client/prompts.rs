// Shared prompt fragments used by every judge-facing meta-prompt.
// Operation-specific templates live in analysis::prompts.

/// Closing instruction appended to every structured request.
pub const JSON_ONLY_INSTRUCTION: &str = "Respond with valid JSON only. \
    Do NOT include any text outside the JSON. \
    Do NOT use markdown code fences. \
    Do NOT include explanations or apologies.";

/// Label used in the meta-prompt when the goal came from the caller.
pub const PROVIDED_GOAL_LABEL: &str = "Provided Goal";

/// Label used in the meta-prompt when the goal was inferred by the judge.
pub const INFERRED_GOAL_LABEL: &str = "Inferred Goal";
