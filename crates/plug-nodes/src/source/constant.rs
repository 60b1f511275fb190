//! Constant
//!
//! Outputs the value of its `value` plug.

use std::sync::Arc;

use plug_graph::{
    ComputeContext, ComputeNode, FingerprintHasher, NodeCategory, NodeDescriptor, NodeMetadata, PlugDefinition,
    PlugType, PlugValue, Result,
};

/// Constant
///
/// # Plugs
/// - `value` (float, in)
/// - `out` (float, out) - equal to `value`
pub struct Constant;

impl Constant {
    pub const PLUG_VALUE: &'static str = "value";
    pub const PLUG_OUT: &'static str = "out";
}

impl NodeDescriptor for Constant {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::describe(&Constant, NodeCategory::Source, "Constant", "Outputs a constant value")
    }
}

inventory::submit!(plug_graph::NodeRegistration {
    node_type: "Constant",
    descriptor: Constant::descriptor,
    factory: || Arc::new(Constant),
});

impl ComputeNode for Constant {
    fn type_name(&self) -> &str {
        "Constant"
    }

    fn plugs(&self) -> Vec<PlugDefinition> {
        vec![
            PlugDefinition::input(Self::PLUG_VALUE, PlugType::Float),
            PlugDefinition::output(Self::PLUG_OUT, PlugType::Float),
        ]
    }

    fn affects(&self, input: &str) -> Vec<String> {
        match input {
            Self::PLUG_VALUE => vec![Self::PLUG_OUT.to_string()],
            _ => Vec::new(),
        }
    }

    fn hash(&self, _output: &str, ctx: &ComputeContext<'_>, h: &mut FingerprintHasher) -> Result<()> {
        ctx.append_plug_hash(Self::PLUG_VALUE, h)
    }

    fn compute(&self, _output: &str, ctx: &ComputeContext<'_>) -> Result<PlugValue> {
        Ok(PlugValue::Float(ctx.get::<f64>(Self::PLUG_VALUE)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plug_graph::{Context, Engine};

    #[test]
    fn test_constant_output() {
        let engine = Engine::default();
        engine.add_node("c", Arc::new(Constant)).unwrap();
        let value = engine.plug("c.value").unwrap();
        let out = engine.plug("c.out").unwrap();

        assert_eq!(engine.get::<f64>(out, &Context::new()).unwrap(), 0.0);
        engine.set_value(value, 2.5).unwrap();
        assert_eq!(engine.get::<f64>(out, &Context::new()).unwrap(), 2.5);
    }

    #[test]
    fn test_output_ignores_context() {
        let engine = Engine::default();
        engine.add_node("c", Arc::new(Constant)).unwrap();
        let out = engine.plug("c.out").unwrap();

        let frame1 = Context::new().with("frame", 1.0);
        let frame2 = Context::new().with("frame", 2.0);
        assert_eq!(engine.hash(out, &frame1).unwrap(), engine.hash(out, &frame2).unwrap());
    }
}
