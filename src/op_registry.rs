use rustc_hash::FxHashMap;

use crate::ops;
use crate::operator::{Attrs, OpError, Operator};

/// Trait for operators which can be constructed from a registered type name
/// and a set of attributes.
pub trait ReadOp: Operator + Sized {
    /// Return the type name under which this operator is registered.
    fn op_type() -> &'static str;

    /// Construct the operator from its attributes.
    fn read(attrs: &Attrs) -> Result<Self, OpError>;

    /// Construct the operator and box it.
    fn read_boxed(attrs: &Attrs) -> Result<Box<dyn Operator>, OpError> {
        let op = Self::read(attrs)?;
        Ok(Box::new(op))
    }
}

type ReadOpFunction = dyn Fn(&Attrs) -> Result<Box<dyn Operator>, OpError> + Send + Sync;

/// Registry used to construct operators by type name.
///
/// New registries have no operators registered by default. To create a
/// registry with all built-in operators pre-registered, use
/// [`OpRegistry::with_all_ops`]. Alternatively create a new registry and
/// selectively register the required operators using
/// [`OpRegistry::register_op`].
#[derive(Default)]
pub struct OpRegistry {
    /// Map from operator type to construction function.
    ops: FxHashMap<&'static str, Box<ReadOpFunction>>,
}

impl OpRegistry {
    /// Create a new empty registry.
    pub fn new() -> OpRegistry {
        OpRegistry {
            ops: FxHashMap::default(),
        }
    }

    /// Register the default/built-in implementation of an operator.
    ///
    /// ```
    /// use rten_seqpool::ops::SequencePool;
    /// use rten_seqpool::{Attrs, OpRegistry};
    ///
    /// let mut reg = OpRegistry::new();
    /// reg.register_op::<SequencePool>();
    ///
    /// let attrs = Attrs::new().with("strategy", 1i64);
    /// let op = reg.create_op("sequence_pool", &attrs).unwrap();
    /// assert_eq!(op.name(), "sequence_pool");
    /// ```
    pub fn register_op<Op: ReadOp + 'static>(&mut self) {
        self.ops.insert(Op::op_type(), Box::new(Op::read_boxed));
    }

    /// Return true if an operator is registered under `op_type`.
    pub fn contains(&self, op_type: &str) -> bool {
        self.ops.contains_key(op_type)
    }

    /// Construct the operator registered under `op_type`.
    pub fn create_op(&self, op_type: &str, attrs: &Attrs) -> Result<Box<dyn Operator>, OpError> {
        let read_fn = self
            .ops
            .get(op_type)
            .ok_or_else(|| OpError::UnknownOperator(op_type.to_string()))?;
        log::debug!("Creating operator {} with attributes {:?}", op_type, attrs);
        read_fn(attrs)
    }

    /// Create a new registry with all built-in operators registered.
    pub fn with_all_ops() -> OpRegistry {
        let mut reg = OpRegistry::new();

        macro_rules! register_op {
            ($op:ident) => {
                reg.register_op::<ops::$op>()
            };
        }

        register_op!(L1Norm);
        register_op!(SequencePool);

        reg
    }
}
