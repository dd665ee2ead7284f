//! Internal testing utilities for the rten-seqpool crates.

use std::fmt::Debug;
use std::panic::{RefUnwindSafe, UnwindSafe};

/// Utility for creating parametrized (aka. table-driven) tests.
///
/// Operator tests typically run the same checks against a table of
/// configurations, eg. every pooling strategy combined with several input
/// shapes. To write such a test:
///
/// 1. Import the `TestCases` trait
/// 2. Create a struct, conventionally named `Case`, that describes a single
///    configuration. This struct must implement `Debug`.
/// 3. Create a collection of `Case` instances, conventionally named `cases`.
/// 4. Call `cases.test_each`, passing the test function as a closure
///
/// All cases are run, even if earlier ones fail. If any case panics,
/// `test_each` panics afterwards with the number of failures and the debug
/// representations of the failing cases.
///
/// ## Example
///
/// ```
/// use rten_seqpool_testing::TestCases;
///
/// fn test_group_sizes() {
///   #[derive(Debug)]
///   struct Case {
///     offsets: &'static [usize],
///     expected: &'static [usize],
///   }
///
///   let cases = [
///     Case { offsets: &[0, 4, 5, 8, 11], expected: &[4, 1, 3, 3] },
///     Case { offsets: &[0, 2], expected: &[2] },
///   ];
///
///   cases.test_each(|case| {
///     let sizes: Vec<_> = case.offsets.windows(2).map(|w| w[1] - w[0]).collect();
///     assert_eq!(sizes, case.expected);
///   });
/// }
/// # test_group_sizes();
/// ```
///
/// ## Unwind safety
///
/// Test cases and the test function must be
/// [unwind safe](https://doc.rust-lang.org/std/panic/fn.catch_unwind.html).
/// Fields which are not (eg. values with interior mutability) should be
/// replaced by a description of how to create the value, or wrapped in
/// [`AssertUnwindSafe`](std::panic::AssertUnwindSafe).
pub trait TestCases {
    /// The data for a single test case.
    type Case;

    /// Call test function `test` with each test case in `self`, catching any panics.
    ///
    /// After all cases have been evaluated, return if no panics occurred or
    /// panic with details of failing cases otherwise.
    fn test_each(self, test: impl Fn(&Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe;

    /// Variant of [`test_each`](TestCases::test_each) which passes test cases
    /// to the test function by value.
    ///
    /// Each case is formatted before the test function is called, so that it
    /// can be reported if the test fails.
    fn test_each_value(self, test: impl Fn(Self::Case) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe;
}

fn report_failures<F: Debug>(failures: &[F]) {
    assert_eq!(
        failures.len(),
        0,
        "{} test cases failed: {:?}",
        failures.len(),
        failures
    );
}

impl<I: IntoIterator> TestCases for I {
    type Case = I::Item;

    fn test_each(self, test: impl Fn(&I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + RefUnwindSafe,
    {
        let failures: Vec<_> = self
            .into_iter()
            .filter(|case| std::panic::catch_unwind(|| test(case)).is_err())
            .collect();
        report_failures(&failures);
    }

    fn test_each_value(self, test: impl Fn(I::Item) + RefUnwindSafe)
    where
        Self::Case: Debug + UnwindSafe,
    {
        let mut failures = Vec::new();
        for case in self {
            let test = &test;
            let case_str = format!("{:?}", case);
            if std::panic::catch_unwind(move || test(case)).is_err() {
                failures.push(case_str);
            }
        }
        report_failures(&failures);
    }
}
