//! facegate-session — Session state and the scan procedures.
//!
//! Owns the single in-memory reference embedding and runs the two
//! bounded scan procedures against it: enrollment (best-of-N capture)
//! and verification (distance match with early exit). All capture and
//! inference happens on a dedicated engine thread; callers talk to it
//! through an async [`SessionHandle`].

pub mod overlay;
pub mod policy;
pub mod procedure;
pub mod scanner;
pub mod session;

pub use policy::{ScanPolicy, SessionConfig};
pub use procedure::{CancelFlag, Enrollment, ProcedureError, Verification};
pub use scanner::{CameraScanner, FaceScanner, ScanError};
pub use session::{spawn_session, EnrollSummary, SessionError, SessionHandle, SessionStatus};

#[cfg(test)]
pub(crate) mod testutil {
    use crate::scanner::{FaceScanner, ScanError, ScanOutcome};
    use facegate_core::{BoundingBox, DetectionSample, Embedding};
    use std::collections::VecDeque;
    use std::time::Duration;

    /// Build a sample with the given detector confidence and embedding.
    pub fn sample(confidence: f32, values: &[f32]) -> DetectionSample {
        DetectionSample {
            face: BoundingBox {
                x: 10.0,
                y: 10.0,
                width: 80.0,
                height: 80.0,
                confidence,
                landmarks: Some([(20.0, 30.0); 5]),
            },
            embedding: Embedding {
                values: values.to_vec(),
                model_version: None,
            },
        }
    }

    /// A sample at unit distance `d` from the reference embedding
    /// `[1.0, 0.0]`: the probe `[1.0, d]` is exactly `d` away.
    pub fn sample_at_distance(d: f32) -> DetectionSample {
        sample(0.9, &[1.0, d])
    }

    pub fn reference_embedding() -> Embedding {
        Embedding {
            values: vec![1.0, 0.0],
            model_version: None,
        }
    }

    /// Scanner that replays a fixed script of per-attempt outcomes.
    pub struct ScriptedScanner {
        script: VecDeque<ScanOutcome>,
        pub scans: usize,
        /// Artificial per-scan latency, for actor timing tests.
        pub delay: Duration,
    }

    impl ScriptedScanner {
        pub fn new(script: Vec<ScanOutcome>) -> Self {
            Self {
                script: script.into(),
                scans: 0,
                delay: Duration::ZERO,
            }
        }

        /// Script where every attempt yields a face with the given
        /// confidence scores (embedding is the reference itself).
        pub fn with_scores(scores: &[f32]) -> Self {
            Self::new(
                scores
                    .iter()
                    .map(|&s| Ok(Some(sample(s, &[1.0, 0.0]))))
                    .collect(),
            )
        }

        /// Script where every attempt yields a face at the given
        /// distances from the reference `[1.0, 0.0]`.
        pub fn with_distances(distances: &[f32]) -> Self {
            Self::new(
                distances
                    .iter()
                    .map(|&d| Ok(Some(sample_at_distance(d))))
                    .collect(),
            )
        }
    }

    impl FaceScanner for ScriptedScanner {
        fn scan(&mut self) -> Result<Option<facegate_core::DetectionSample>, ScanError> {
            self.scans += 1;
            if !self.delay.is_zero() {
                std::thread::sleep(self.delay);
            }
            self.script
                .pop_front()
                .unwrap_or_else(|| panic!("scanner script exhausted after {} scans", self.scans))
        }
    }
}
