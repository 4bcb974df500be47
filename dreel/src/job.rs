//! Progress reporting towards whatever job is driving the reel writer.
use log::info;

pub trait Progress {
    /// Start a new named stage of the job.
    fn sub(&self, label: &str);

    /// Fraction of the current stage that is done, `0.0..=1.0`.
    fn set_progress(&self, fraction: f32);
}

/// Progress sink that only logs stage changes.
pub struct LogProgress;

impl Progress for LogProgress {
    fn sub(&self, label: &str) {
        info!("{}", label);
    }

    fn set_progress(&self, _fraction: f32) {}
}

pub(crate) fn sub(progress: Option<&dyn Progress>, label: &str) {
    if let Some(p) = progress {
        p.sub(label);
    }
}

pub(crate) fn set_progress(progress: Option<&dyn Progress>, fraction: f32) {
    if let Some(p) = progress {
        p.set_progress(fraction);
    }
}

#[cfg(test)]
pub(crate) mod test_progress {
    use super::*;
    use std::cell::RefCell;

    /// Records everything it is told, for asserting on in tests.
    #[derive(Default)]
    pub struct Recorder {
        pub stages: RefCell<Vec<String>>,
        pub fractions: RefCell<Vec<f32>>,
    }

    impl Progress for Recorder {
        fn sub(&self, label: &str) {
            self.stages.borrow_mut().push(label.to_string());
        }

        fn set_progress(&self, fraction: f32) {
            self.fractions.borrow_mut().push(fraction);
        }
    }

    #[test]
    fn none_is_fine() {
        sub(None, "nothing listens");
        set_progress(None, 0.5);
    }

    #[test]
    fn forwards() {
        let recorder = Recorder::default();
        sub(Some(&recorder), "stage");
        set_progress(Some(&recorder), 0.25);

        assert_eq!(*recorder.stages.borrow(), vec!["stage".to_string()]);
        assert_eq!(*recorder.fractions.borrow(), vec![0.25]);
    }
}
