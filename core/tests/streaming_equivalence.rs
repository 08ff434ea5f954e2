//! Causal continuity tests for the streaming engine.
//!
//! Block-wise processing with threaded state must match whole-signal
//! processing, state shapes never change, failures never commit, and the
//! batch tail policy is exactly as documented.
//!
//! The suite runs against the mock model, and against the real model when
//! `test_models/llvc_model.onnx` (or `LLVC_TEST_MODEL`) exists.
//!
//! ```bash
//! cargo test --test streaming_equivalence
//! ```

use llvc_core::framing::{BlockFramer, TailPolicy};
use llvc_core::pipeline::BatchDriver;
use llvc_core::runtime_adapter::StreamingModel;
use llvc_core::session::StreamingSession;
use llvc_core::state::{ModelState, StateKind};
use llvc_core::testing::{fixtures, FailureMode, MockStreamingModel};
use llvc_core::{ErrorKind, LlvcError};

const TOLERANCE: f32 = 1e-5;

fn max_abs_diff(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "length mismatch");
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).abs())
        .fold(0.0, f32::max)
}

// ─────────────────────────────────────────────────────────────────────────────
// Conformance Suite
// ─────────────────────────────────────────────────────────────────────────────

/// Properties every streaming model must satisfy.
fn streaming_conformance_suite<M: StreamingModel>(model: M, block: usize, model_name: &str) {
    let signal = fixtures::noise(2 * block, 42);

    // Two blocks with threaded state.
    let mut session = StreamingSession::new(model);
    assert!(session.state().is_zeroed(), "{}: start state not zero", model_name);
    let mut blocked = session.process_block(&signal[..block]).unwrap();
    let mid_state = session.state().clone();
    for kind in StateKind::ALL {
        assert_eq!(mid_state.get(kind).shape(), kind.shape());
    }
    blocked.extend(session.process_block(&signal[block..]).unwrap());
    let end_state = session.state().clone();
    println!("✓ {}: two blocks of {} processed", model_name, block);

    // One block of 2L from the same zero state.
    session.reset();
    assert!(session.state().is_zeroed());
    let whole = session.process_block(&signal).unwrap();
    assert_eq!(whole.len(), 2 * block);

    let diff = max_abs_diff(&blocked, &whole);
    assert!(
        diff <= TOLERANCE,
        "{}: block-wise output differs from whole-signal output by {}",
        model_name,
        diff
    );
    println!("✓ {}: equivalence holds (max diff {:e})", model_name, diff);

    // Determinism: same inputs, same outputs.
    session.reset();
    let again_first = session.process_block(&signal[..block]).unwrap();
    assert_eq!(&again_first[..], &blocked[..block]);
    assert_eq!(session.state(), &mid_state);
    let again_second = session.process_block(&signal[block..]).unwrap();
    assert_eq!(&again_second[..], &blocked[block..]);
    assert_eq!(session.state(), &end_state);
    println!("✓ {}: deterministic", model_name);
}

#[test]
fn test_mock_conformance() {
    for block in [1, 24, 512, 1024] {
        streaming_conformance_suite(MockStreamingModel::new(), block, "mock");
    }
}

#[cfg(feature = "onnx")]
#[test]
fn test_onnx_conformance() {
    use llvc_core::config::ModelConfig;
    use llvc_core::runtime_adapter::OnnxStreamingModel;

    let path = std::env::var("LLVC_TEST_MODEL")
        .map(std::path::PathBuf::from)
        .unwrap_or_else(|_| {
            std::path::PathBuf::from(env!("CARGO_MANIFEST_DIR"))
                .join("../test_models/llvc_model.onnx")
        });
    if !path.exists() {
        println!("⚠ Skipping ONNX conformance: {} not found", path.display());
        return;
    }

    let model = OnnxStreamingModel::load(&ModelConfig::new(&path)).unwrap();
    streaming_conformance_suite(model, 1024, "onnx");
}

// ─────────────────────────────────────────────────────────────────────────────
// Engine Properties
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_2048_zero_samples_in_two_blocks() {
    let signal = fixtures::silence(2048);

    // Drive the two calls by hand so each call's input state can be checked.
    let mut model = MockStreamingModel::new();
    let zero = ModelState::zeros();
    let first = model.infer(&signal[..1024], &zero).unwrap();
    let second = model.infer(&signal[1024..], &first.state).unwrap();
    assert_eq!(model.call_count(), 2);

    let mut session = StreamingSession::new(MockStreamingModel::new());
    session.process_block(&signal[..1024]).unwrap();
    // The state the second call starts from is the first call's output state.
    assert_eq!(session.state(), &first.state);
    session.process_block(&signal[1024..]).unwrap();
    assert_eq!(session.state(), &second.state);

    let mut driver = BatchDriver::new(MockStreamingModel::new(), 16000);
    let (blocked, report) = driver
        .process_signal(&signal, 1024, TailPolicy::Drop)
        .unwrap();
    assert_eq!(report.blocks, 2);
    assert_eq!(driver.session().model().call_count(), 2);

    let mut driver = BatchDriver::new(MockStreamingModel::new(), 16000);
    let (single, report) = driver
        .process_signal(&signal, 2048, TailPolicy::Drop)
        .unwrap();
    assert_eq!(report.blocks, 1);

    assert_eq!(blocked.len(), 2048);
    assert_eq!(blocked, single);
}

#[test]
fn test_shape_invariance_over_long_sequence() {
    let signal = fixtures::sine_wave(16000, 220.0, 1.0);
    let mut session = StreamingSession::new(MockStreamingModel::new());

    for block in signal.chunks(700) {
        let out = session.process_block(block).unwrap();
        assert_eq!(out.len(), block.len());
        assert!(session.state().validate().is_ok());
        for kind in StateKind::ALL {
            assert_eq!(session.state().get(kind).shape(), kind.shape());
        }
    }
}

#[test]
fn test_irregular_splits_match_whole() {
    let signal = fixtures::noise(3000, 7);

    let mut whole_session = StreamingSession::new(MockStreamingModel::new());
    let whole = whole_session.process_block(&signal).unwrap();

    let mut session = StreamingSession::new(MockStreamingModel::new());
    let mut pieces = Vec::new();
    let mut start = 0;
    for len in [1, 13, 512, 999, 475, 1000] {
        pieces.extend(session.process_block(&signal[start..start + len]).unwrap());
        start += len;
    }
    assert_eq!(start, signal.len());
    assert!(max_abs_diff(&pieces, &whole) <= TOLERANCE);
    assert_eq!(session.state(), whole_session.state());
}

#[test]
fn test_tail_is_dropped() {
    let block = 1024;
    let k = 3;
    let r = 300;
    let signal = fixtures::noise(k * block + r, 3);

    let mut driver = BatchDriver::new(MockStreamingModel::new(), 16000);
    let (out, report) = driver
        .process_signal(&signal, block, TailPolicy::Drop)
        .unwrap();

    assert_eq!(out.len(), k * block);
    assert_eq!(report.blocks, k as u64);

    // Output covers exactly the first k*L samples.
    let mut session = StreamingSession::new(MockStreamingModel::new());
    let reference = session.process_block(&signal[..k * block]).unwrap();
    assert!(max_abs_diff(&out, &reference) <= TOLERANCE);
}

#[test]
fn test_zero_pad_tail_matches_prefix() {
    let signal = fixtures::noise(2500, 4);

    let mut driver = BatchDriver::new(MockStreamingModel::new(), 16000);
    let (out, _) = driver
        .process_signal(&signal, 1024, TailPolicy::ZeroPad)
        .unwrap();
    assert_eq!(out.len(), signal.len());

    // Padding comes after the real samples, so a causal model's output for
    // the real samples is unaffected by it.
    let mut session = StreamingSession::new(MockStreamingModel::new());
    let reference = session.process_block(&signal).unwrap();
    assert!(max_abs_diff(&out, &reference) <= TOLERANCE);
}

#[test]
fn test_failure_isolation_then_fresh_session() {
    let block = 512;
    let signal = fixtures::noise(4 * block, 11);
    let blocks: Vec<&[f32]> = signal.chunks_exact(block).collect();

    // Reference run without faults.
    let mut clean = StreamingSession::new(MockStreamingModel::new());
    let reference: Vec<Vec<f32>> = blocks
        .iter()
        .map(|b| clean.process_block(b).unwrap())
        .collect();

    for mode in [FailureMode::BadStateShape, FailureMode::BadOutputLength] {
        let model = MockStreamingModel::new().fail_on_call(3, mode);
        let mut session = StreamingSession::new(model).with_block_size(block);

        session.process_block(blocks[0]).unwrap();
        session.process_block(blocks[1]).unwrap();
        let before = session.state().clone();

        let err = session.process_block(blocks[2]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ShapeMismatch, "{:?}", mode);
        assert_eq!(session.state(), &before, "{:?} committed partial state", mode);
        assert_eq!(session.blocks_processed(), 2);

        // Abort and restart from zero on the same model.
        session.reset();
        assert!(session.state().is_zeroed());
        for (b, expected) in blocks.iter().zip(&reference) {
            assert_eq!(&session.process_block(b).unwrap(), expected);
        }
    }
}

#[test]
fn test_wrong_length_block_is_shape_mismatch() {
    let mut session = StreamingSession::new(MockStreamingModel::new()).with_block_size(1024);
    session.process_block(&fixtures::noise(1024, 1)).unwrap();
    let before = session.state().clone();

    match session.process_block(&fixtures::noise(1000, 2)) {
        Err(LlvcError::ShapeMismatch { tensor, expected, actual }) => {
            assert_eq!(tensor, "input");
            assert_eq!(expected, vec![1, 1, 1024]);
            assert_eq!(actual, vec![1, 1, 1000]);
        }
        other => panic!("expected shape mismatch, got {:?}", other),
    }
    assert_eq!(session.state(), &before);
}

#[test]
fn test_whole_signal_mode_matches_blocks() {
    let signal = fixtures::noise(4096, 21);

    let mut driver = BatchDriver::new(MockStreamingModel::new(), 16000);
    let (whole, report) = driver.process_whole(&signal).unwrap();
    assert_eq!(report.blocks, 1);
    assert_eq!(whole.len(), 4096);

    let (blocked, _) = driver
        .process_signal(&signal, 1024, TailPolicy::Drop)
        .unwrap();
    assert!(max_abs_diff(&whole, &blocked) <= TOLERANCE);
}

#[test]
fn test_framer_offsets_are_contiguous() {
    let signal = fixtures::noise(10_000, 5);
    let framer = BlockFramer::new(&signal, 1024, TailPolicy::ZeroPad).unwrap();

    let mut expected_offset = 0;
    for block in framer {
        assert_eq!(block.offset, expected_offset);
        assert_eq!(block.samples.len(), 1024);
        expected_offset += block.valid_len;
    }
    assert_eq!(expected_offset, signal.len());
}
