//! End-to-end scenarios for the runner and the batch executor.

#[cfg(test)]
mod tests {
    use crate::config::BatchOptions;
    use crate::core::{PipelineStage, StageStatus, RUN_REPORT_KEY};
    use crate::events::{BATCH_COMPLETED, BATCH_ITEM_COMPLETED, BATCH_STARTED};
    use crate::pipeline::{BatchExecutor, REASON_NOT_AVAILABLE, REASON_NOT_IMPLEMENTED};
    use crate::testing::{
        assert_locked_order, assert_run_failed, assert_run_succeeded, assert_stage_sequence,
        assert_stage_status, ConsumerBehavior, RecordingSimulator, ScriptedDecider,
        ScriptedEnricher, ScriptedParser, ScriptedRetriever, TestHarness,
    };
    use pretty_assertions::assert_eq;

    use PipelineStage::{Decide, Enrich, Evaluate, ExecuteHardware, Parse, Retrieve, Simulate};
    use StageStatus::{Failed, Skipped, Success};

    fn inputs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| (*s).to_string()).collect()
    }

    #[test]
    fn test_two_scenes_with_unavailable_consumers() {
        let harness = TestHarness::new(2);
        let result = harness.run("two_scenes.txt").unwrap();

        assert_run_succeeded(&result);
        assert_stage_sequence(
            &result,
            &[
                (Parse, Success),
                (Enrich, Skipped),
                (Retrieve, Success),
                (Decide, Success),
                (Enrich, Skipped),
                (Retrieve, Success),
                (Decide, Success),
                (Simulate, Skipped),
                (Evaluate, Skipped),
            ],
        );
        for stage in [Enrich, Simulate, Evaluate] {
            assert!(result
                .results_for(stage)
                .all(|r| r.skip_reason() == Some(REASON_NOT_AVAILABLE)));
        }
    }

    #[test]
    fn test_retrieve_failure_stops_before_decide() {
        let harness =
            TestHarness::new(1).with_retriever(ScriptedRetriever::new().fail_on(0));
        let result = harness.run("one_scene.txt").unwrap();

        assert_run_failed(&result, "retrieval failed for s0");
        assert_stage_sequence(
            &result,
            &[(Parse, Success), (Enrich, Skipped), (Retrieve, Failed)],
        );
        assert_eq!(harness.decider.call_count(), 0);
    }

    #[test]
    fn test_out_of_range_intensity_aborts() {
        let harness = TestHarness::full(2)
            .with_decider(ScriptedDecider::new().with_intensity_at(0, 1.3));
        let result = harness.run("bright.txt").unwrap();

        assert_run_failed(&result, "1.3");
        assert_stage_status(&result, Decide, &[Failed]);
        assert_eq!(harness.decider.call_count(), 1);
        assert_eq!(harness.simulator.as_ref().unwrap().call_count(), 0);
        assert_eq!(harness.evaluator.as_ref().unwrap().call_count(), 0);
    }

    #[test]
    fn test_missing_group_id_aborts() {
        let harness =
            TestHarness::new(3).with_decider(ScriptedDecider::new().missing_group_id_at(1));
        let result = harness.run("three.txt").unwrap();

        assert_run_failed(&result, "Missing group_id in decision group 0");
        assert_stage_status(&result, Decide, &[Success, Failed]);
        assert_eq!(harness.retriever.call_count(), 2);
    }

    #[test]
    fn test_parse_failure_records_single_result() {
        for message in ["empty script", "unreadable file"] {
            let harness = TestHarness::full(2).with_parser(ScriptedParser::failing(message));
            let result = harness.run("broken.txt").unwrap();

            assert_run_failed(&result, message);
            assert_stage_sequence(&result, &[(Parse, Failed)]);
            assert_eq!(harness.retriever.call_count(), 0);
        }
    }

    #[test]
    fn test_enrich_failure_degrades_only_that_scene() {
        let harness = TestHarness::full(3).with_enricher(ScriptedEnricher::default().fail_on(1));
        let result = harness.run("three.txt").unwrap();

        assert_run_succeeded(&result);
        assert_stage_status(&result, Enrich, &[Success, Failed, Success]);
        assert_stage_status(&result, Decide, &[Success, Success, Success]);

        let seen = harness.decider.seen_scenes();
        let neutral: Vec<_> = seen
            .iter()
            .map(|s| s.annotation.as_ref().is_some_and(|a| a.is_neutral()))
            .collect();
        assert_eq!(neutral, vec![false, true, false]);

        let received = harness.simulator.as_ref().unwrap().received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].len(), 3);
    }

    #[test]
    fn test_optional_failure_never_flips_run() {
        let harness = TestHarness::full(2).with_simulator(RecordingSimulator::with_behavior(
            ConsumerBehavior::Fail("renderer crashed".to_string()),
        ));
        let mut runner = harness.runner().unwrap();
        let result = runner.run("two.txt");

        assert_run_succeeded(&result);
        assert!(result.error().is_none());
        assert_stage_status(&result, Simulate, &[Failed]);
        assert_stage_status(&result, Evaluate, &[Success]);
        assert_eq!(runner.state().status, Success);
    }

    #[test]
    fn test_failed_run_stays_failed() {
        let harness = TestHarness::full(3).with_retriever(ScriptedRetriever::new().fail_on(1));
        let mut runner = harness.runner().unwrap();
        let observer = runner.observer();
        let result = runner.run("three.txt");

        assert_eq!(result.final_status(), Failed);
        assert!(result.stage_results().iter().all(|r| r.stage() != Simulate));
        assert_eq!(observer.snapshot().status, Failed);
        assert!(observer.snapshot().is_finished());
        assert_eq!(observer.summary().sub_items_processed, 1);
    }

    #[test]
    fn test_full_run_keeps_locked_order() {
        let harness = TestHarness::full(2).configure(|c| c.with_hardware(true));
        let result = harness.run("full.txt").unwrap();

        assert_run_succeeded(&result);
        assert_locked_order(&result);
        let last = result.stage_results().last().unwrap();
        assert_eq!(last.stage(), ExecuteHardware);
        assert_eq!(last.skip_reason(), Some(REASON_NOT_IMPLEMENTED));
        assert_eq!(result.results_for(Enrich).count(), 2);
    }

    #[test]
    fn test_report_written_for_failed_run() {
        let dir = tempfile::tempdir().unwrap();
        let harness = TestHarness::new(1)
            .with_parser(ScriptedParser::failing("bad header"))
            .configure(|c| c.with_output_dir(dir.path()));
        let result = harness.run("broken.txt").unwrap();

        let path = result.output_paths().get(RUN_REPORT_KEY).unwrap();
        let report: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(report["final_status"], "failed");
        assert_eq!(report["error"], "bad header");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_batch_isolates_failing_input() {
        for order in [
            ["a.txt", "b.txt", "bad.txt", "d.txt", "e.txt"],
            ["bad.txt", "a.txt", "b.txt", "d.txt", "e.txt"],
            ["a.txt", "b.txt", "d.txt", "e.txt", "bad.txt"],
        ] {
            let harness = TestHarness::full(2)
                .with_parser(ScriptedParser::with_scene_count(2).fail_on_input("bad.txt"));
            let executor = harness.executor().unwrap();
            let results = executor
                .run_batch(inputs(&order), &BatchOptions::concurrent(2).unwrap())
                .await;

            assert_eq!(results.len(), 5);
            for (input, result) in order.iter().zip(&results) {
                assert_eq!(result.input_id(), *input);
                if *input == "bad.txt" {
                    assert_run_failed(result, "malformed input: bad.txt");
                    assert_stage_sequence(result, &[(Parse, Failed)]);
                } else {
                    assert_run_succeeded(result);
                }
            }

            let summary = BatchExecutor::summarize(&results);
            assert_eq!(summary.successful, 4);
            assert_eq!(summary.failed, 1);
            assert!((summary.success_rate - 0.8).abs() < 1e-9);
        }
    }

    #[tokio::test]
    async fn test_sequential_and_concurrent_agree() {
        let names = inputs(&["one.txt", "bad.txt", "three.txt"]);
        let harness = TestHarness::new(1)
            .with_parser(ScriptedParser::with_scene_count(1).fail_on_input("bad.txt"));
        let executor = harness.executor().unwrap();

        let sequential = executor
            .run_batch(names.clone(), &BatchOptions::sequential())
            .await;
        let concurrent = executor
            .run_batch(names, &BatchOptions::concurrent(3).unwrap())
            .await;

        let statuses = |results: &[crate::core::RunResult]| {
            results
                .iter()
                .map(|r| (r.input_id().to_string(), r.final_status()))
                .collect::<Vec<_>>()
        };
        assert_eq!(statuses(&sequential), statuses(&concurrent));
        assert_eq!(harness.parser.call_count(), 6);
    }

    #[tokio::test]
    async fn test_batch_events() {
        let harness = TestHarness::new(1);
        let executor = harness.executor().unwrap();
        executor
            .run_batch(inputs(&["a.txt", "b.txt"]), &BatchOptions::sequential())
            .await;

        let types = harness.sink.event_types();
        assert_eq!(types.first().map(String::as_str), Some(BATCH_STARTED));
        assert_eq!(types.last().map(String::as_str), Some(BATCH_COMPLETED));
        assert_eq!(harness.sink.events_of_type(BATCH_ITEM_COMPLETED).len(), 2);
    }

    #[tokio::test]
    async fn test_directory_batch_in_sorted_order() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["c.txt", "a.txt", "b.txt", "notes.md"] {
            std::fs::write(dir.path().join(name), "INT. ROOM - DAY").unwrap();
        }

        let harness = TestHarness::new(1);
        let results = harness
            .executor()
            .unwrap()
            .run_directory(dir.path(), None, &BatchOptions::default())
            .await;

        let names: Vec<_> = results
            .iter()
            .map(|r| {
                std::path::Path::new(r.input_id())
                    .file_name()
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        assert_eq!(names, vec!["a.txt", "b.txt", "c.txt"]);
        assert!(results.iter().all(|r| r.is_success()));
    }

    #[test]
    fn test_summarize_empty_and_pure() {
        let empty = BatchExecutor::summarize(&[]);
        assert_eq!(empty.total, 0);
        assert_eq!(empty.success_rate, 0.0);
        assert_eq!(empty.average_duration_seconds, 0.0);

        let harness = TestHarness::new(1).with_parser(ScriptedParser::failing("nope"));
        let results = vec![
            TestHarness::new(1).run("ok.txt").unwrap(),
            harness.run("bad.txt").unwrap(),
        ];
        assert_eq!(
            BatchExecutor::summarize(&results),
            BatchExecutor::summarize(&results)
        );
    }
}
