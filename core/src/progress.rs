/// Fraction of the run completed, in [0, 1].
pub type ProgressCallback<'a> = Box<dyn Fn(f64) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, fraction: f64) {
        if let Some(cb) = &self.callback {
            cb(fraction);
        }
    }
}
