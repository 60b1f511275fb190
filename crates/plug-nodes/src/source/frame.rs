//! Frame
//!
//! Outputs the current frame, scaled and offset.

use std::sync::Arc;

use plug_graph::{
    keys, ComputeContext, ComputeNode, FingerprintHasher, NodeCategory, NodeDescriptor, NodeMetadata,
    PlugDefinition, PlugType, PlugValue, Result,
};

/// Frame
///
/// # Plugs
/// - `scale` (float, in, default 1)
/// - `offset` (float, in)
/// - `out` (float, out) - `frame * scale + offset`
///
/// # Context
/// - `frame`, defaulting to 1 when unset
pub struct Frame;

impl Frame {
    pub const PLUG_SCALE: &'static str = "scale";
    pub const PLUG_OFFSET: &'static str = "offset";
    pub const PLUG_OUT: &'static str = "out";
}

impl NodeDescriptor for Frame {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::describe(
            &Frame,
            NodeCategory::Source,
            "Frame",
            "Outputs the context's frame, scaled and offset",
        )
    }
}

inventory::submit!(plug_graph::NodeRegistration {
    node_type: "Frame",
    descriptor: Frame::descriptor,
    factory: || Arc::new(Frame),
});

impl ComputeNode for Frame {
    fn type_name(&self) -> &str {
        "Frame"
    }

    fn plugs(&self) -> Vec<PlugDefinition> {
        vec![
            PlugDefinition::input(Self::PLUG_SCALE, PlugType::Float).with_default(1.0),
            PlugDefinition::input(Self::PLUG_OFFSET, PlugType::Float),
            PlugDefinition::output(Self::PLUG_OUT, PlugType::Float),
        ]
    }

    fn affects(&self, input: &str) -> Vec<String> {
        match input {
            Self::PLUG_SCALE | Self::PLUG_OFFSET => vec![Self::PLUG_OUT.to_string()],
            _ => Vec::new(),
        }
    }

    fn hash(&self, _output: &str, ctx: &ComputeContext<'_>, h: &mut FingerprintHasher) -> Result<()> {
        ctx.append_plug_hash(Self::PLUG_SCALE, h)?;
        ctx.append_plug_hash(Self::PLUG_OFFSET, h)?;
        ctx.append_context_variable(keys::FRAME, h);
        Ok(())
    }

    fn compute(&self, _output: &str, ctx: &ComputeContext<'_>) -> Result<PlugValue> {
        let scale = ctx.get::<f64>(Self::PLUG_SCALE)?;
        let offset = ctx.get::<f64>(Self::PLUG_OFFSET)?;
        Ok(PlugValue::Float(ctx.context().frame() * scale + offset))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plug_graph::{Context, ContextScope, Engine};

    #[test]
    fn test_frame_output() {
        let engine = Engine::default();
        engine.add_node("f", Arc::new(Frame)).unwrap();
        let out = engine.plug("f.out").unwrap();

        assert_eq!(engine.get::<f64>(out, &Context::new()).unwrap(), 1.0);
        assert_eq!(engine.get::<f64>(out, &Context::new().with(keys::FRAME, 10.0)).unwrap(), 10.0);

        engine.set_value(engine.plug("f.scale").unwrap(), 2.0).unwrap();
        engine.set_value(engine.plug("f.offset").unwrap(), 0.5).unwrap();
        assert_eq!(engine.get::<f64>(out, &Context::new().with(keys::FRAME, 10.0)).unwrap(), 20.5);
    }

    #[test]
    fn test_frames_hash_differently() {
        let engine = Engine::default();
        engine.add_node("f", Arc::new(Frame)).unwrap();
        let out = engine.plug("f.out").unwrap();

        let a = engine.hash(out, &Context::new().with(keys::FRAME, 1.0)).unwrap();
        let b = engine.hash(out, &Context::new().with(keys::FRAME, 2.0)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_scoped_context() {
        let engine = Engine::default();
        engine.add_node("f", Arc::new(Frame)).unwrap();
        let out = engine.plug("f.out").unwrap();

        let _scope = ContextScope::new(Context::new().with(keys::FRAME, 4.0));
        assert_eq!(engine.get::<f64>(out, &Context::current()).unwrap(), 4.0);
    }
}
