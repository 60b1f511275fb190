//! Time Warp
//!
//! Evaluates its input at a different frame: `frame * speed + offset`.

use std::sync::Arc;

use plug_graph::{
    keys, ComputeContext, ComputeNode, Context, FingerprintHasher, NodeCategory, NodeDescriptor, NodeMetadata,
    PlugDefinition, PlugType, PlugValue, Result,
};

/// Time Warp
///
/// # Plugs
/// - `in` (float, in) - evaluated at the warped frame
/// - `speed` (float, in, default 1)
/// - `offset` (float, in)
/// - `out` (float, out)
pub struct TimeWarp;

impl TimeWarp {
    pub const PLUG_IN: &'static str = "in";
    pub const PLUG_SPEED: &'static str = "speed";
    pub const PLUG_OFFSET: &'static str = "offset";
    pub const PLUG_OUT: &'static str = "out";

    /// The context `in` is evaluated in
    fn warped(ctx: &ComputeContext<'_>) -> Result<Context> {
        let speed = ctx.get::<f64>(Self::PLUG_SPEED)?;
        let offset = ctx.get::<f64>(Self::PLUG_OFFSET)?;
        let frame = ctx.context().frame() * speed + offset;
        Ok(ctx.context().with(keys::FRAME, frame))
    }
}

impl NodeDescriptor for TimeWarp {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::describe(
            &TimeWarp,
            NodeCategory::Context,
            "Time Warp",
            "Evaluates the input at a remapped frame",
        )
    }
}

inventory::submit!(plug_graph::NodeRegistration {
    node_type: "TimeWarp",
    descriptor: TimeWarp::descriptor,
    factory: || Arc::new(TimeWarp),
});

impl ComputeNode for TimeWarp {
    fn type_name(&self) -> &str {
        "TimeWarp"
    }

    fn plugs(&self) -> Vec<PlugDefinition> {
        vec![
            PlugDefinition::input(Self::PLUG_IN, PlugType::Float),
            PlugDefinition::input(Self::PLUG_SPEED, PlugType::Float).with_default(1.0),
            PlugDefinition::input(Self::PLUG_OFFSET, PlugType::Float),
            PlugDefinition::output(Self::PLUG_OUT, PlugType::Float),
        ]
    }

    fn affects(&self, input: &str) -> Vec<String> {
        match input {
            Self::PLUG_IN | Self::PLUG_SPEED | Self::PLUG_OFFSET => vec![Self::PLUG_OUT.to_string()],
            _ => Vec::new(),
        }
    }

    fn pass_through(&self, _output: &str, ctx: &ComputeContext<'_>) -> Result<Option<String>> {
        let identity = ctx.get::<f64>(Self::PLUG_SPEED)? == 1.0 && ctx.get::<f64>(Self::PLUG_OFFSET)? == 0.0;
        Ok(identity.then(|| Self::PLUG_IN.to_string()))
    }

    fn hash(&self, _output: &str, ctx: &ComputeContext<'_>, h: &mut FingerprintHasher) -> Result<()> {
        let warped = ctx.with_context(Self::warped(ctx)?);
        warped.append_plug_hash(Self::PLUG_IN, h)
    }

    fn compute(&self, _output: &str, ctx: &ComputeContext<'_>) -> Result<PlugValue> {
        let warped = ctx.with_context(Self::warped(ctx)?);
        Ok(PlugValue::Float(warped.get::<f64>(Self::PLUG_IN)?))
    }
}
