//! The [`Operator`] trait for defining operators.

use std::any::Any;
use std::error::Error;
use std::fmt;
use std::fmt::{Debug, Display};

use rustc_hash::FxHashMap;

use crate::lod::{LodError, LodTensor};

/// Value of an operator attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue {
    Int(i64),
    Float(f32),
    String(String),
}

impl AttrValue {
    fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Int(_) => "int",
            AttrValue::Float(_) => "float",
            AttrValue::String(_) => "string",
        }
    }
}

impl From<i64> for AttrValue {
    fn from(val: i64) -> Self {
        AttrValue::Int(val)
    }
}

impl From<i32> for AttrValue {
    fn from(val: i32) -> Self {
        AttrValue::Int(val as i64)
    }
}

impl From<f32> for AttrValue {
    fn from(val: f32) -> Self {
        AttrValue::Float(val)
    }
}

impl From<&str> for AttrValue {
    fn from(val: &str) -> Self {
        AttrValue::String(val.to_string())
    }
}

/// Static attributes used to configure an operator, keyed by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Attrs {
    attrs: FxHashMap<String, AttrValue>,
}

macro_rules! impl_attr_getter {
    ($name:ident, $variant:ident, $type:ty) => {
        /// Return the attribute named `name`, or `None` if unset.
        ///
        /// Fails if the attribute is set but has a different type.
        pub fn $name(&self, name: &str) -> Result<Option<$type>, OpError> {
            match self.attrs.get(name) {
                None => Ok(None),
                Some(AttrValue::$variant(val)) => Ok(Some(val.clone())),
                Some(other) => Err(OpError::InvalidAttr {
                    name: name.to_string(),
                    reason: format!(
                        "expected {} but found {}",
                        AttrValue::$variant(Default::default()).type_name(),
                        other.type_name()
                    ),
                }),
            }
        }
    };
}

impl Attrs {
    pub fn new() -> Attrs {
        Attrs::default()
    }

    /// Set attribute `name` and return the updated attributes.
    pub fn with(mut self, name: &str, value: impl Into<AttrValue>) -> Attrs {
        self.set(name, value);
        self
    }

    pub fn set(&mut self, name: &str, value: impl Into<AttrValue>) {
        self.attrs.insert(name.to_string(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&AttrValue> {
        self.attrs.get(name)
    }

    impl_attr_getter!(get_int, Int, i64);
    impl_attr_getter!(get_float, Float, f32);
    impl_attr_getter!(get_string, String, String);
}

/// Named operator inputs or outputs.
pub type VarMap = FxHashMap<String, LodTensor>;

/// Return the name under which the gradient of variable `name` is passed.
pub fn grad_var_name(name: &str) -> String {
    format!("{}@GRAD", name)
}

/// Look up a required variable.
pub fn require<'a>(vars: &'a VarMap, name: &str) -> Result<&'a LodTensor, OpError> {
    vars.get(name)
        .ok_or_else(|| OpError::MissingInput(name.to_string()))
}

/// Possible reasons why an operator may fail on a given input.
#[derive(Clone, Debug, PartialEq)]
pub enum OpError {
    /// A required input was not provided.
    MissingInput(String),

    /// An attribute has the wrong type or an unsupported value.
    InvalidAttr { name: String, reason: String },

    /// No operator is registered under the requested type name.
    UnknownOperator(String),

    /// Input tensor shapes are not compatible with each other or operator
    /// attributes.
    IncompatibleInputShapes(&'static str),

    /// An input has a value that is incorrect.
    InvalidValue(&'static str),

    /// An input's length-offset table is invalid.
    InvalidLod(LodError),
}

impl Display for OpError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OpError::MissingInput(name) => write!(f, "required input \"{}\" is missing", name),
            OpError::InvalidAttr { name, reason } => {
                write!(f, "invalid attribute \"{}\": {}", name, reason)
            }
            OpError::UnknownOperator(op_type) => {
                write!(f, "operator \"{}\" is not registered", op_type)
            }
            OpError::IncompatibleInputShapes(details) => {
                write!(f, "incompatible input shapes: {}", details)
            }
            OpError::InvalidValue(details) => {
                write!(f, "input or attribute has invalid value: {}", details)
            }
            OpError::InvalidLod(err) => write!(f, "invalid LoD: {}", err),
        }
    }
}

impl Error for OpError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            OpError::InvalidLod(err) => Some(err),
            _ => None,
        }
    }
}

impl From<LodError> for OpError {
    fn from(val: LodError) -> OpError {
        OpError::InvalidLod(val)
    }
}

/// An Operator performs a computation step on named inputs, producing named
/// outputs, and can compute the gradient of a loss with respect to its
/// inputs given the gradient with respect to its outputs.
///
/// Operators take a set of static attributes when they are constructed. See
/// [`OpRegistry`](crate::OpRegistry) for constructing operators by type name.
pub trait Operator: Any + Debug + Send + Sync {
    /// Return the registered type name of the operator.
    fn name(&self) -> &str;

    /// Return the names of the inputs this operator reads.
    fn input_names(&self) -> &[&'static str];

    /// Return the names of the outputs this operator produces.
    fn output_names(&self) -> &[&'static str];

    /// Execute the operator.
    fn run(&self, inputs: &VarMap) -> Result<VarMap, OpError>;

    /// Compute gradients with respect to the inputs.
    ///
    /// `out_grads` contains the gradient for each output, keyed by
    /// [`grad_var_name`] of the output name. The result contains the
    /// gradient for each differentiable input, keyed by [`grad_var_name`] of
    /// the input name.
    fn run_grad(&self, inputs: &VarMap, out_grads: &VarMap) -> Result<VarMap, OpError>;

    /// Return true if this operator is differentiable with respect to
    /// input `name`.
    fn has_grad(&self, name: &str) -> bool {
        self.input_names().iter().any(|input| *input == name)
    }
}
