use super::*;

#[test]
fn display_prefixes_are_stable() {
    assert!(
        DotMatrixError::invalid_params("x")
            .to_string()
            .contains("invalid params:")
    );
    assert!(
        DotMatrixError::invalid_buffer("x")
            .to_string()
            .contains("invalid buffer:")
    );
    assert!(
        DotMatrixError::decode("x")
            .to_string()
            .contains("decode error:")
    );
    assert!(
        DotMatrixError::encode("x")
            .to_string()
            .contains("encode error:")
    );
}

#[test]
fn out_of_bounds_names_the_coordinate() {
    let err = DotMatrixError::OutOfBounds {
        x: 4,
        y: 1,
        width: 4,
        height: 4,
    };
    assert_eq!(err.to_string(), "sample (4, 1) out of bounds for 4x4 buffer");
}

#[test]
fn other_preserves_source() {
    let base = std::io::Error::other("boom");
    let err = DotMatrixError::Other(anyhow::Error::new(base));
    assert!(err.to_string().contains("boom"));
}

#[test]
fn pipeline_errors_report_frames_written() {
    let err = PipelineError::DecodeFailed {
        position: 2,
        frames_written: 0,
        reason: "truncated".to_owned(),
    }
    .with_frames_written(2);
    assert_eq!(err.frames_written(), 2);
    assert!(err.to_string().contains("decode failed at frame 2"));

    assert_eq!(
        PipelineError::InvalidParams("x".to_owned())
            .with_frames_written(9)
            .frames_written(),
        0
    );

    let wrapped: DotMatrixError = PipelineError::Cancelled { frames_written: 3 }.into();
    assert!(wrapped.to_string().contains("cancelled after 3 frames"));
}
