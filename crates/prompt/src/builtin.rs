//! Prompt definitions compiled into the binary.
//!
//! Workspaces can shadow any of these by writing a file with the same id
//! to `.researchx/prompts/<id>.yml`.

/// Rewrites the working query for one retrieval source.
pub const REFINE: &str = "research.refine";

/// Classifies one passage as related / unrelated to the question.
pub const GRADE: &str = "research.grade";

/// Produces the final answer from the gathered evidence.
pub const SYNTHESIZE: &str = "research.synthesize";

/// Names a new conversation after its first question.
pub const TITLE: &str = "conversation.title";

const BUILTINS: &[(&str, &str)] = &[
    (REFINE, include_str!("../prompts/research.refine.yml")),
    (GRADE, include_str!("../prompts/research.grade.yml")),
    (SYNTHESIZE, include_str!("../prompts/research.synthesize.yml")),
    (TITLE, include_str!("../prompts/conversation.title.yml")),
];

/// Raw YAML for a built-in prompt id.
pub fn builtin_source(prompt_id: &str) -> Option<&'static str> {
    BUILTINS
        .iter()
        .find(|(id, _)| *id == prompt_id)
        .map(|(_, source)| *source)
}

/// Ids of every built-in prompt.
pub fn builtin_ids() -> impl Iterator<Item = &'static str> {
    BUILTINS.iter().map(|(id, _)| *id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PromptDefinition;

    #[test]
    fn test_builtins_parse_and_match_ids() {
        for id in builtin_ids() {
            let source = builtin_source(id).unwrap();
            let def: PromptDefinition = serde_yaml::from_str(source).unwrap();
            assert_eq!(def.id, id);
            assert!(!def.template.is_empty());
        }
    }

    #[test]
    fn test_grade_prompt_requests_json() {
        let def: PromptDefinition = serde_yaml::from_str(builtin_source(GRADE).unwrap()).unwrap();
        assert!(def.output.is_json());
    }
}
