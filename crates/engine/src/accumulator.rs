//! Evidence Accumulator.

use crate::error::{EngineError, EngineResult};
use crate::source::SourceState;
use crate::state::TurnState;

/// Merge judged-relevant passages into the turn and close out the search.
///
/// Appends `relevant` to `evidence` in arrival order (duplicates kept),
/// adds to the active source's `relevant_found`, marks it `searched` and
/// clears `pending_passages`.
pub fn accumulate(state: &TurnState, relevant: Vec<String>) -> EngineResult<TurnState> {
    let source = state
        .active_source
        .ok_or_else(|| EngineError::InvalidState("no active source to accumulate into".to_string()))?;

    if state.source_progress.get(source).state == SourceState::Exhausted {
        return Err(EngineError::InvalidState(format!(
            "source {} is exhausted for this turn",
            source
        )));
    }

    let mut next = state.clone();
    let status = next.source_progress.get_mut(source);
    status.relevant_found += relevant.len() as u32;
    status.state = SourceState::Searched;
    next.evidence.extend(relevant);
    next.pending_passages.clear();
    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::SourceId;

    #[test]
    fn test_accumulate_appends_and_counts() {
        let mut state = TurnState::new("q", Vec::new(), SourceId::AcademicIndex);
        state.evidence.push("earlier".to_string());
        state.pending_passages = vec!["a".to_string(), "b".to_string(), "c".to_string()];

        let next = accumulate(&state, vec!["a".to_string(), "a".to_string()]).unwrap();

        assert_eq!(next.evidence, vec!["earlier", "a", "a"]);
        assert!(next.pending_passages.is_empty());
        let status = next.source_progress.get(SourceId::AcademicIndex);
        assert_eq!(status.relevant_found, 2);
        assert_eq!(status.state, SourceState::Searched);
        assert_eq!(status.attempts_used, 0);
    }

    #[test]
    fn test_empty_result_still_marks_searched() {
        let state = TurnState::new("q", Vec::new(), SourceId::GeneralWeb);
        let next = accumulate(&state, Vec::new()).unwrap();
        assert_eq!(
            next.source_progress.get(SourceId::GeneralWeb).state,
            SourceState::Searched
        );
        assert!(next.evidence.is_empty());
    }

    #[test]
    fn test_rejects_missing_or_exhausted_source() {
        let mut state = TurnState::new("q", Vec::new(), SourceId::GeneralWeb);
        state.source_progress.get_mut(SourceId::GeneralWeb).state = SourceState::Exhausted;
        assert!(accumulate(&state, Vec::new()).is_err());

        state.active_source = None;
        assert!(matches!(
            accumulate(&state, Vec::new()),
            Err(EngineError::InvalidState(_))
        ));
    }
}
