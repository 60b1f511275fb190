//! Arithmetic
//!
//! Combines two floats with a selectable operation.

use std::sync::Arc;

use plug_graph::{
    ComputeContext, ComputeNode, FingerprintHasher, NodeCategory, NodeDescriptor, NodeMetadata, Plug,
    PlugDefinition, PlugType, PlugValue, Result,
};

/// Operation selected by the `operation` plug
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Add = 0,
    Subtract = 1,
    Multiply = 2,
    Divide = 3,
    Min = 4,
    Max = 5,
}

impl Operation {
    pub fn from_index(index: i64) -> Option<Self> {
        match index {
            0 => Some(Self::Add),
            1 => Some(Self::Subtract),
            2 => Some(Self::Multiply),
            3 => Some(Self::Divide),
            4 => Some(Self::Min),
            5 => Some(Self::Max),
            _ => None,
        }
    }

    pub fn apply(&self, a: f64, b: f64) -> Option<f64> {
        match self {
            Self::Add => Some(a + b),
            Self::Subtract => Some(a - b),
            Self::Multiply => Some(a * b),
            Self::Divide => (b != 0.0).then(|| a / b),
            Self::Min => Some(a.min(b)),
            Self::Max => Some(a.max(b)),
        }
    }
}

/// Arithmetic
///
/// # Plugs
/// - `a`, `b` (float, in)
/// - `operation` (int, in) - see `Operation`; only accepts int inputs
/// - `out` (float, out)
pub struct Arithmetic;

impl Arithmetic {
    pub const PLUG_A: &'static str = "a";
    pub const PLUG_B: &'static str = "b";
    pub const PLUG_OPERATION: &'static str = "operation";
    pub const PLUG_OUT: &'static str = "out";
}

impl NodeDescriptor for Arithmetic {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::describe(
            &Arithmetic,
            NodeCategory::Processing,
            "Arithmetic",
            "Adds, subtracts, multiplies or divides two values",
        )
    }
}

inventory::submit!(plug_graph::NodeRegistration {
    node_type: "Arithmetic",
    descriptor: Arithmetic::descriptor,
    factory: || Arc::new(Arithmetic),
});

impl ComputeNode for Arithmetic {
    fn type_name(&self) -> &str {
        "Arithmetic"
    }

    fn plugs(&self) -> Vec<PlugDefinition> {
        vec![
            PlugDefinition::input(Self::PLUG_A, PlugType::Float),
            PlugDefinition::input(Self::PLUG_B, PlugType::Float),
            PlugDefinition::input(Self::PLUG_OPERATION, PlugType::Int),
            PlugDefinition::output(Self::PLUG_OUT, PlugType::Float),
        ]
    }

    fn affects(&self, input: &str) -> Vec<String> {
        match input {
            Self::PLUG_A | Self::PLUG_B | Self::PLUG_OPERATION => vec![Self::PLUG_OUT.to_string()],
            _ => Vec::new(),
        }
    }

    fn accepts_input(&self, plug: &str, source: &Plug) -> bool {
        plug != Self::PLUG_OPERATION || source.plug_type() == PlugType::Int
    }

    fn hash(&self, _output: &str, ctx: &ComputeContext<'_>, h: &mut FingerprintHasher) -> Result<()> {
        ctx.append_plug_hash(Self::PLUG_A, h)?;
        ctx.append_plug_hash(Self::PLUG_B, h)?;
        ctx.append_plug_hash(Self::PLUG_OPERATION, h)
    }

    fn compute(&self, _output: &str, ctx: &ComputeContext<'_>) -> Result<PlugValue> {
        let index = ctx.get::<i64>(Self::PLUG_OPERATION)?;
        let operation = Operation::from_index(index).ok_or_else(|| ctx.error(format!("unknown operation {}", index)))?;
        let a = ctx.get::<f64>(Self::PLUG_A)?;
        let b = ctx.get::<f64>(Self::PLUG_B)?;
        operation
            .apply(a, b)
            .map(PlugValue::Float)
            .ok_or_else(|| ctx.error("division by zero"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{Constant, Frame};
    use plug_graph::{keys, Context, Engine, PlugGraphError};

    fn setup(a: f64, b: f64, operation: Operation) -> Engine {
        let engine = Engine::default();
        engine.add_node("math", Arc::new(Arithmetic)).unwrap();
        engine.set_value(engine.plug("math.a").unwrap(), a).unwrap();
        engine.set_value(engine.plug("math.b").unwrap(), b).unwrap();
        engine
            .set_value(engine.plug("math.operation").unwrap(), operation as i64)
            .unwrap();
        engine
    }

    #[test]
    fn test_operations() {
        let cases = [
            (Operation::Add, 5.0),
            (Operation::Subtract, 1.0),
            (Operation::Multiply, 6.0),
            (Operation::Divide, 1.5),
            (Operation::Min, 2.0),
            (Operation::Max, 3.0),
        ];
        for (operation, expected) in cases {
            let engine = setup(3.0, 2.0, operation);
            let out = engine.plug("math.out").unwrap();
            assert_eq!(engine.get::<f64>(out, &Context::new()).unwrap(), expected, "{operation:?}");
        }
    }

    #[test]
    fn test_errors() {
        let engine = setup(1.0, 0.0, Operation::Divide);
        let out = engine.plug("math.out").unwrap();
        let err = engine.get_value(out, &Context::new()).unwrap_err();
        assert!(matches!(err, PlugGraphError::Compute { ref message, .. } if message.contains("division by zero")));

        engine.set_value(engine.plug("math.operation").unwrap(), 42i64).unwrap();
        assert!(engine.get_value(out, &Context::new()).is_err());
    }

    #[test]
    fn test_chain_follows_frame() {
        let engine = Engine::default();
        engine.add_node("frame", Arc::new(Frame)).unwrap();
        engine.add_node("two", Arc::new(Constant)).unwrap();
        engine.add_node("math", Arc::new(Arithmetic)).unwrap();
        engine.set_value(engine.plug("two.value").unwrap(), 2.0).unwrap();
        engine
            .set_value(engine.plug("math.operation").unwrap(), Operation::Multiply as i64)
            .unwrap();
        engine
            .connect(engine.plug("frame.out").unwrap(), engine.plug("math.a").unwrap())
            .unwrap();
        engine
            .connect(engine.plug("two.out").unwrap(), engine.plug("math.b").unwrap())
            .unwrap();

        let out = engine.plug("math.out").unwrap();
        assert_eq!(engine.get::<f64>(out, &Context::new().with(keys::FRAME, 3.0)).unwrap(), 6.0);
        assert_eq!(engine.get::<f64>(out, &Context::new().with(keys::FRAME, 4.0)).unwrap(), 8.0);
    }

    #[test]
    fn test_operation_only_accepts_ints() {
        let engine = Engine::default();
        engine.add_node("c", Arc::new(Constant)).unwrap();
        engine.add_node("math", Arc::new(Arithmetic)).unwrap();
        let source = engine.plug("c.out").unwrap();

        assert!(engine.accepts_input(engine.plug("math.a").unwrap(), source));
        assert!(!engine.accepts_input(engine.plug("math.operation").unwrap(), source));
        assert!(matches!(
            engine.connect(source, engine.plug("math.operation").unwrap()),
            Err(PlugGraphError::IncompatibleInput(_))
        ));
    }
}
