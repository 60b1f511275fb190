//! Context Query
//!
//! Reads a named context variable. Only the queried variable enters the
//! hash, so contexts differing in other variables share results.

use std::sync::Arc;

use plug_graph::{
    ComputeContext, ComputeNode, ContextValue, FingerprintHasher, NodeCategory, NodeDescriptor, NodeMetadata,
    PlugDefinition, PlugType, PlugValue, Result,
};

/// Context Query
///
/// # Plugs
/// - `name` (string, in) - the variable to read
/// - `default` (float, in) - used when the variable is unset or not numeric
/// - `value` (float, out)
/// - `exists` (bool, out)
pub struct ContextQuery;

impl ContextQuery {
    pub const PLUG_NAME: &'static str = "name";
    pub const PLUG_DEFAULT: &'static str = "default";
    pub const PLUG_VALUE: &'static str = "value";
    pub const PLUG_EXISTS: &'static str = "exists";
}

impl NodeDescriptor for ContextQuery {
    fn descriptor() -> NodeMetadata {
        NodeMetadata::describe(
            &ContextQuery,
            NodeCategory::Source,
            "Context Query",
            "Outputs the value of a context variable",
        )
    }
}

inventory::submit!(plug_graph::NodeRegistration {
    node_type: "ContextQuery",
    descriptor: ContextQuery::descriptor,
    factory: || Arc::new(ContextQuery),
});

fn numeric(value: &ContextValue) -> Option<f64> {
    match value {
        ContextValue::Int(v) => Some(*v as f64),
        ContextValue::Float(v) => Some(*v),
        ContextValue::Bool(v) => Some(if *v { 1.0 } else { 0.0 }),
        _ => None,
    }
}

impl ComputeNode for ContextQuery {
    fn type_name(&self) -> &str {
        "ContextQuery"
    }

    fn plugs(&self) -> Vec<PlugDefinition> {
        vec![
            PlugDefinition::input(Self::PLUG_NAME, PlugType::String),
            PlugDefinition::input(Self::PLUG_DEFAULT, PlugType::Float),
            PlugDefinition::output(Self::PLUG_VALUE, PlugType::Float),
            PlugDefinition::output(Self::PLUG_EXISTS, PlugType::Bool),
        ]
    }

    fn affects(&self, input: &str) -> Vec<String> {
        match input {
            Self::PLUG_NAME => vec![Self::PLUG_VALUE.to_string(), Self::PLUG_EXISTS.to_string()],
            Self::PLUG_DEFAULT => vec![Self::PLUG_VALUE.to_string()],
            _ => Vec::new(),
        }
    }

    fn hash(&self, output: &str, ctx: &ComputeContext<'_>, h: &mut FingerprintHasher) -> Result<()> {
        let name = ctx.get::<String>(Self::PLUG_NAME)?;
        h.append_str(&name);
        ctx.append_context_variable(&name, h);
        if output == Self::PLUG_VALUE {
            ctx.append_plug_hash(Self::PLUG_DEFAULT, h)?;
        }
        Ok(())
    }

    fn compute(&self, output: &str, ctx: &ComputeContext<'_>) -> Result<PlugValue> {
        let name = ctx.get::<String>(Self::PLUG_NAME)?;
        let variable = ctx.context().get_opt(&name);
        if output == Self::PLUG_EXISTS {
            return Ok(PlugValue::Bool(variable.is_some()));
        }
        match variable.and_then(numeric) {
            Some(value) => Ok(PlugValue::Float(value)),
            None => Ok(PlugValue::Float(ctx.get::<f64>(Self::PLUG_DEFAULT)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use plug_graph::{Context, Engine};

    fn setup(name: &str) -> Engine {
        let engine = Engine::default();
        engine.add_node("query", Arc::new(ContextQuery)).unwrap();
        engine.set_value(engine.plug("query.name").unwrap(), name).unwrap();
        engine.set_value(engine.plug("query.default").unwrap(), -1.0).unwrap();
        engine
    }

    #[test]
    fn test_query_values() {
        let engine = setup("scale");
        let value = engine.plug("query.value").unwrap();
        let exists = engine.plug("query.exists").unwrap();

        assert_eq!(engine.get::<f64>(value, &Context::new()).unwrap(), -1.0);
        assert!(!engine.get::<bool>(exists, &Context::new()).unwrap());

        let ctx = Context::new().with("scale", 3i64);
        assert_eq!(engine.get::<f64>(value, &ctx).unwrap(), 3.0);
        assert!(engine.get::<bool>(exists, &ctx).unwrap());

        // Non-numeric values fall back to the default but still exist
        let ctx = Context::new().with("scale", "big");
        assert_eq!(engine.get::<f64>(value, &ctx).unwrap(), -1.0);
        assert!(engine.get::<bool>(exists, &ctx).unwrap());
    }

    #[test]
    fn test_unrelated_variables_share_results() {
        let engine = setup("scale");
        let value = engine.plug("query.value").unwrap();

        let a = Context::new().with("scale", 2.0).with("frame", 1.0);
        let b = Context::new().with("scale", 2.0).with("frame", 50.0);
        assert_eq!(engine.hash(value, &a).unwrap(), engine.hash(value, &b).unwrap());

        engine.get_value(value, &a).unwrap();
        engine.get_value(value, &b).unwrap();
        assert_eq!(engine.cache_stats().misses, 1);
    }

    #[test]
    fn test_renaming_invalidates() {
        let engine = setup("scale");
        let value = engine.plug("query.value").unwrap();
        let ctx = Context::new().with("scale", 2.0).with("offset", 5.0);
        assert_eq!(engine.get::<f64>(value, &ctx).unwrap(), 2.0);

        engine.set_value(engine.plug("query.name").unwrap(), "offset").unwrap();
        assert_eq!(engine.get::<f64>(value, &ctx).unwrap(), 5.0);
    }
}
