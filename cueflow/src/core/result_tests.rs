//! Tests for StageResult and RunResult.

#[cfg(test)]
mod tests {
    use crate::core::{
        OutputSummary, PipelineStage, RunResult, StageClass, StageOutcome, StageResult,
        StageStatus,
    };
    use crate::utils::generate_uuid;
    use pretty_assertions::assert_eq;

    fn summary(key: &str, value: serde_json::Value) -> OutputSummary {
        let mut map = OutputSummary::new();
        map.insert(key.to_string(), value);
        map
    }

    #[test]
    fn test_stage_result_success_has_only_output() {
        let result = StageResult::success(
            PipelineStage::Parse,
            Some(summary("scene_count", serde_json::json!(2))),
            0.25,
        );
        assert_eq!(result.status(), StageStatus::Success);
        assert_eq!(
            result.output().and_then(|o| o.get("scene_count")),
            Some(&serde_json::json!(2))
        );
        assert!(result.error().is_none());
        assert!(result.skip_reason().is_none());
        assert_eq!(result.duration_seconds(), 0.25);
    }

    #[test]
    fn test_stage_result_failed_has_only_error() {
        let result = StageResult::failed(PipelineStage::Retrieve, "index offline", 0.1);
        assert_eq!(result.status(), StageStatus::Failed);
        assert_eq!(result.error(), Some("index offline"));
        assert_eq!(result.message(), Some("index offline"));
        assert!(result.output().is_none());
    }

    #[test]
    fn test_stage_result_skipped_takes_no_time() {
        let result = StageResult::skipped(PipelineStage::Simulate, "Disabled by configuration");
        assert_eq!(result.status(), StageStatus::Skipped);
        assert_eq!(result.skip_reason(), Some("Disabled by configuration"));
        assert!(result.error().is_none());
        assert_eq!(result.duration_seconds(), 0.0);
    }

    #[test]
    fn test_stage_result_from_outcome() {
        let failed = StageResult::from_outcome(
            PipelineStage::Decide,
            StageOutcome::Failed("bad".to_string()),
            0.5,
        )
        .with_sub_item("scene_001");
        assert_eq!(failed.status(), StageStatus::Failed);
        assert_eq!(failed.sub_item(), Some("scene_001"));

        let skipped = StageResult::from_outcome(
            PipelineStage::Evaluate,
            StageOutcome::Skipped("n/a".to_string()),
            3.0,
        );
        assert_eq!(skipped.duration_seconds(), 0.0);
    }

    #[test]
    fn test_run_result_success_path() {
        let mut run = RunResult::new("script.txt", generate_uuid());
        assert_eq!(run.final_status(), StageStatus::Running);

        run.push_stage(StageResult::success(PipelineStage::Parse, None, 0.5), StageClass::Required);
        run.push_stage(StageResult::success(PipelineStage::Decide, None, 0.25), StageClass::Required);
        run.mark_complete();

        assert!(run.is_success());
        assert_eq!(run.stage_results().len(), 2);
        assert_eq!(run.duration_seconds(), 0.75);
        assert!(run.completed_at().is_some());
        assert!(run.error().is_none());
    }

    #[test]
    fn test_optional_failure_does_not_fail_run() {
        let mut run = RunResult::new("script.txt", generate_uuid());
        run.push_stage(StageResult::failed(PipelineStage::Enrich, "model down", 0.1), StageClass::Optional);
        run.push_stage(StageResult::failed(PipelineStage::Simulate, "no display", 0.1), StageClass::Optional);
        run.mark_complete();

        assert_eq!(run.final_status(), StageStatus::Success);
        assert!(run.error().is_none());
    }

    #[test]
    fn test_required_failure_is_monotonic() {
        let mut run = RunResult::new("script.txt", generate_uuid());
        run.push_stage(StageResult::failed(PipelineStage::Retrieve, "index offline", 0.1), StageClass::Required);
        assert_eq!(run.final_status(), StageStatus::Failed);

        run.push_stage(StageResult::success(PipelineStage::Simulate, None, 0.1), StageClass::Optional);
        run.mark_complete();
        run.mark_complete();

        assert_eq!(run.final_status(), StageStatus::Failed);
        assert_eq!(run.error(), Some("index offline"));
    }

    #[test]
    fn test_first_error_is_kept() {
        let mut run = RunResult::new("script.txt", generate_uuid());
        run.abort("first");
        run.abort("second");
        assert_eq!(run.error(), Some("first"));
    }

    #[test]
    fn test_failed_placeholder() {
        let run = RunResult::failed_placeholder("broken.txt", "worker crashed");
        assert_eq!(run.final_status(), StageStatus::Failed);
        assert_eq!(run.input_id(), "broken.txt");
        assert_eq!(run.error(), Some("worker crashed"));
        assert!(run.stage_results().is_empty());
        assert!(run.completed_at().is_some());
    }

    #[test]
    fn test_results_for_stage() {
        let mut run = RunResult::new("script.txt", generate_uuid());
        run.push_stage(StageResult::success(PipelineStage::Parse, None, 0.0), StageClass::Required);
        run.push_stage(StageResult::success(PipelineStage::Decide, None, 0.0), StageClass::Required);
        run.push_stage(StageResult::success(PipelineStage::Decide, None, 0.0), StageClass::Required);

        assert_eq!(run.results_for(PipelineStage::Decide).count(), 2);
        assert_eq!(run.results_for(PipelineStage::Enrich).count(), 0);
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let mut run = RunResult::new("script.txt", generate_uuid());
        run.push_stage(StageResult::success(PipelineStage::Parse, None, 0.1), StageClass::Required);
        run.mark_complete();

        let path = run.write_report(dir.path()).unwrap();
        assert_eq!(
            path.file_name().and_then(|n| n.to_str()),
            Some(format!("run_{}.json", run.run_id()).as_str())
        );

        let loaded: RunResult =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded, run);
    }
}
