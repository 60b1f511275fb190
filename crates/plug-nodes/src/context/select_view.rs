//! Select View
//!
//! Evaluates its input for a chosen view of a multi-view image.

use std::sync::Arc;

use plug_graph::{
    keys, ComputeContext, ComputeNode, ContextValue, FingerprintHasher, NodeCategory, NodeDescriptor, NodeMetadata,
    PlugDefinition, PlugType, PlugValue, Result,
};

/// Select View
///
/// # Plugs
/// - `in` (float, in) - evaluated with `image:viewName` set to `view`
/// - `view` (string, in, default "left")
/// - `out` (float, out)
pub struct SelectView;

impl SelectView {
    pub const PLUG_IN: &'static str = "in";
    pub const PLUG_VIEW: &'static str = "view";
    pub const PLUG_OUT: &'static str = "out";
}

impl NodeDescriptor for SelectView {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::describe(
            &SelectView,
            NodeCategory::Context,
            "Select View",
            "Evaluates the input for a single view",
        )
    }
}

inventory::submit!(plug_graph::NodeRegistration {
    node_type: "SelectView",
    descriptor: SelectView::descriptor,
    factory: || Arc::new(SelectView),
});

impl ComputeNode for SelectView {
    fn type_name(&self) -> &str {
        "SelectView"
    }

    fn plugs(&self) -> Vec<PlugDefinition> {
        vec![
            PlugDefinition::input(Self::PLUG_IN, PlugType::Float),
            PlugDefinition::input(Self::PLUG_VIEW, PlugType::String).with_default("left"),
            PlugDefinition::output(Self::PLUG_OUT, PlugType::Float),
        ]
    }

    fn affects(&self, input: &str) -> Vec<String> {
        match input {
            Self::PLUG_IN | Self::PLUG_VIEW => vec![Self::PLUG_OUT.to_string()],
            _ => Vec::new(),
        }
    }

    /// Already in the selected view, so `in` can be used as is
    fn pass_through(&self, _output: &str, ctx: &ComputeContext<'_>) -> Result<Option<String>> {
        let view = ctx.get::<String>(Self::PLUG_VIEW)?;
        let current = ctx.context().get_opt(keys::VIEW_NAME).and_then(|v| match v {
            ContextValue::String(s) => Some(s.as_str()),
            _ => None,
        });
        Ok((current == Some(view.as_str())).then(|| Self::PLUG_IN.to_string()))
    }

    fn hash(&self, _output: &str, ctx: &ComputeContext<'_>, h: &mut FingerprintHasher) -> Result<()> {
        let view = ctx.get::<String>(Self::PLUG_VIEW)?;
        let selected = ctx.with_context(ctx.context().with(keys::VIEW_NAME, view));
        selected.append_plug_hash(Self::PLUG_IN, h)
    }

    fn compute(&self, _output: &str, ctx: &ComputeContext<'_>) -> Result<PlugValue> {
        let view = ctx.get::<String>(Self::PLUG_VIEW)?;
        let selected = ctx.with_context(ctx.context().with(keys::VIEW_NAME, view));
        Ok(PlugValue::Float(selected.get::<f64>(Self::PLUG_IN)?))
    }
}
