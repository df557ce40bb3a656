//! Input Sources
//!
//! Supplies the input for the i-th unit of work. Two variants exist:
//!
//! - **Fixed**: a preloaded ordered collection. Reads are pure; the same
//!   collection may back several fan-outs at once.
//! - **Generator**: caller logic invoked on demand with the unit index,
//!   paired with a count known up front. The scheduler asks for each index
//!   exactly once, so the generator may have side effects.

use std::fmt;
use std::sync::Arc;

use super::error::FanOutError;

/// Boxed generator function mapping a unit index to its input.
pub type GeneratorFn<T> = Box<dyn FnMut(usize) -> T + Send>;

/// On-demand input supplier with a known total count.
pub struct InputGenerator<T> {
    generate: GeneratorFn<T>,
    count: usize,
}

impl<T> InputGenerator<T> {
    /// Creates a generator yielding `count` inputs.
    pub fn new<F>(count: usize, generate: F) -> Self
    where
        F: FnMut(usize) -> T + Send + 'static,
    {
        Self {
            generate: Box::new(generate),
            count,
        }
    }

    /// Number of inputs this generator yields.
    pub fn count(&self) -> usize {
        self.count
    }
}

impl<T> fmt::Debug for InputGenerator<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InputGenerator")
            .field("count", &self.count)
            .finish_non_exhaustive()
    }
}

/// Where unit inputs come from.
pub enum InputSource<T> {
    /// Preloaded ordered collection.
    Fixed(Arc<[T]>),
    /// Inputs produced on demand.
    Generator(InputGenerator<T>),
}

impl<T: Clone> InputSource<T> {
    /// Builds a source from the two optional representations.
    ///
    /// Exactly one of `fixed` and `generator` must be present. An empty
    /// fixed collection is a valid source of zero inputs.
    pub fn from_parts(
        fixed: Option<Arc<[T]>>,
        generator: Option<InputGenerator<T>>,
    ) -> Result<Self, FanOutError> {
        match (fixed, generator) {
            (Some(inputs), None) => Ok(Self::Fixed(inputs)),
            (None, Some(generator)) => Ok(Self::Generator(generator)),
            (Some(_), Some(_)) => Err(FanOutError::configuration(
                "both fixed inputs and an input generator were supplied; choose one",
            )),
            (None, None) => Err(FanOutError::configuration(
                "no input source supplied; provide fixed inputs or an input generator",
            )),
        }
    }

    /// Returns the input for unit `index`, or `None` past the end.
    ///
    /// For a generator this runs caller logic; callers must not ask for the
    /// same index twice.
    pub fn value(&mut self, index: usize) -> Option<T> {
        match self {
            Self::Fixed(inputs) => inputs.get(index).cloned(),
            Self::Generator(generator) if index < generator.count() => {
                Some((generator.generate)(index))
            }
            Self::Generator(_) => None,
        }
    }

    /// Total number of inputs.
    pub fn size(&self) -> usize {
        match self {
            Self::Fixed(inputs) => inputs.len(),
            Self::Generator(generator) => generator.count(),
        }
    }

    /// Short label for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Fixed(_) => "fixed",
            Self::Generator(_) => "generator",
        }
    }
}

impl<T> fmt::Debug for InputSource<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Fixed(inputs) => f.debug_tuple("Fixed").field(&inputs.len()).finish(),
            Self::Generator(generator) => f.debug_tuple("Generator").field(generator).finish(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn test_fixed_source_values() {
        let mut source = InputSource::from_parts(Some(Arc::from(vec![1, 2, 3])), None).unwrap();

        assert_eq!(source.size(), 3);
        assert_eq!(source.kind(), "fixed");
        assert_eq!(source.value(0), Some(1));
        assert_eq!(source.value(2), Some(3));
        assert_eq!(source.value(3), None);
    }

    #[test]
    fn test_fixed_source_idempotent() {
        let mut source = InputSource::from_parts(Some(Arc::from(vec!["a", "b"])), None).unwrap();
        assert_eq!(source.value(1), source.value(1));
    }

    #[test]
    fn test_fixed_source_shared_collection() {
        let inputs: Arc<[u32]> = Arc::from(vec![5, 6]);
        let mut first = InputSource::from_parts(Some(Arc::clone(&inputs)), None).unwrap();
        let mut second = InputSource::from_parts(Some(Arc::clone(&inputs)), None).unwrap();

        assert_eq!(first.value(0), Some(5));
        assert_eq!(second.value(0), Some(5));
        assert_eq!(Arc::strong_count(&inputs), 3);
    }

    #[test]
    fn test_empty_fixed_source_is_valid() {
        let source = InputSource::<u8>::from_parts(Some(Arc::from(Vec::new())), None).unwrap();
        assert_eq!(source.size(), 0);
    }

    #[test]
    fn test_generator_source_calls_once_per_index() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let recorded = Arc::clone(&calls);
        let generator = InputGenerator::new(3, move |i| {
            recorded.lock().unwrap().push(i);
            i * 10
        });

        let mut source = InputSource::from_parts(None, Some(generator)).unwrap();
        assert_eq!(source.size(), 3);
        assert_eq!(source.kind(), "generator");

        let values: Vec<_> = (0..3).map(|i| source.value(i)).collect();
        assert_eq!(values, vec![Some(0), Some(10), Some(20)]);
        assert_eq!(*calls.lock().unwrap(), vec![0, 1, 2]);
    }

    #[test]
    fn test_generator_past_end_not_invoked() {
        let calls = Arc::new(Mutex::new(0usize));
        let counter = Arc::clone(&calls);
        let generator = InputGenerator::new(1, move |i| {
            *counter.lock().unwrap() += 1;
            i
        });

        let mut source = InputSource::from_parts(None, Some(generator)).unwrap();
        assert_eq!(source.value(5), None);
        assert_eq!(*calls.lock().unwrap(), 0);
    }

    #[test]
    fn test_both_sources_rejected() {
        let generator = InputGenerator::new(2, |i| i);
        let err = InputSource::from_parts(Some(Arc::from(vec![1usize])), Some(generator)).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("both"));
    }

    #[test]
    fn test_missing_source_rejected() {
        let err = InputSource::<i32>::from_parts(None, None).unwrap_err();
        assert!(err.is_configuration());
        assert!(err.to_string().contains("no input source"));
    }

    #[test]
    fn test_generator_debug_hides_closure() {
        let generator = InputGenerator::new(4, |i| i);
        assert_eq!(format!("{:?}", generator), "InputGenerator { count: 4, .. }");
    }
}
