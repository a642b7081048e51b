//! Block nodes and their kind-specific parameters.
//!
//! [`BlockParams`] is a closed tagged variant with one arm per registered
//! kind, so every consumer matches exhaustively. Blocks whose type string the
//! registry does not recognize are carried as [`BlockParams::Unknown`] with
//! their raw data untouched.
//!
//! On the wire a block is `{ "type": "<editor kind>", "data": { .. } }`; the
//! conversion goes through [`RawBlock`] so unknown kinds never fail decoding.

use serde::{Deserialize, Serialize};

use crate::block::{self, BlockKind, Family, ParamValue, RegistryEntry};
use crate::error::CoreError;
use crate::id::NodeId;

// ---------------------------------------------------------------------------
// Per-kind parameter structs
// ---------------------------------------------------------------------------

/// Input and Output layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DenseParams {
    pub size_in: u32,
    pub size_out: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Activation {
    #[default]
    Relu,
    Sigmoid,
    Tanh,
    Softmax,
    Linear,
}

impl Activation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Activation::Relu => "relu",
            Activation::Sigmoid => "sigmoid",
            Activation::Tanh => "tanh",
            Activation::Softmax => "softmax",
            Activation::Linear => "linear",
        }
    }

    pub fn parse(s: &str) -> Option<Activation> {
        match s {
            "relu" => Some(Activation::Relu),
            "sigmoid" => Some(Activation::Sigmoid),
            "tanh" => Some(Activation::Tanh),
            "softmax" => Some(Activation::Softmax),
            "linear" => Some(Activation::Linear),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HiddenParams {
    pub size_in: u32,
    pub size_out: u32,
    #[serde(default)]
    pub activation: Activation,
}

/// `size_in`/`size_out` are channel counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvParams {
    pub size_in: u32,
    pub size_out: u32,
    #[serde(alias = "size")]
    pub kernel_size: u32,
    #[serde(default)]
    pub padding: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PoolType {
    #[default]
    Max,
    Avg,
}

impl PoolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolType::Max => "max",
            PoolType::Avg => "avg",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolParams {
    /// Mirrors the preceding convolution's output channels.
    pub channels: u32,
    #[serde(alias = "size")]
    pub kernel_size: u32,
    #[serde(default = "default_stride")]
    pub stride: u32,
    #[serde(default, alias = "type")]
    pub pool_type: PoolType,
}

fn default_stride() -> u32 {
    2
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassifierParams {
    #[serde(default)]
    pub classes: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Optimizer {
    #[default]
    Adam,
    Sgd,
    Rmsprop,
    Adagrad,
}

impl Optimizer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Optimizer::Adam => "adam",
            Optimizer::Sgd => "sgd",
            Optimizer::Rmsprop => "rmsprop",
            Optimizer::Adagrad => "adagrad",
        }
    }
}

/// Training hyperparameters, held by a Training block or stored with a
/// project. Missing fields take the registry defaults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TrainingConfig {
    pub epochs: u32,
    pub batch_size: u32,
    pub learning_rate: f64,
    pub optimizer: Optimizer,
    pub validation_split: f64,
    pub shuffle: bool,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        TrainingConfig {
            epochs: 10,
            batch_size: 32,
            learning_rate: 0.001,
            optimizer: Optimizer::Adam,
            validation_split: 0.2,
            shuffle: true,
        }
    }
}

impl TrainingConfig {
    /// Checks every field against the Training block schema.
    pub fn validate(&self) -> Result<(), CoreError> {
        match BlockParams::Training(self.clone()).domain_violations().into_iter().next() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

// ---------------------------------------------------------------------------
// BlockParams
// ---------------------------------------------------------------------------

/// Kind plus parameters of a block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "RawBlock", try_from = "RawBlock")]
pub enum BlockParams {
    Input(DenseParams),
    Hidden(HiddenParams),
    Output(DenseParams),
    Convolutional(ConvParams),
    Pooling(PoolParams),
    Classifier(ClassifierParams),
    Training(TrainingConfig),
    Start,
    /// Placeholder for a kind the registry does not define.
    Unknown {
        kind: String,
        data: serde_json::Value,
    },
}

/// Wire form of a block: editor type string plus free-form data object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub data: serde_json::Value,
}

impl BlockParams {
    /// Parameters a new block of `kind` starts with, taken from the registry.
    pub fn default_for(kind: BlockKind) -> BlockParams {
        let spec = block::spec(kind);
        let mut data = serde_json::Map::new();
        for p in spec.params {
            if let Ok(v) = serde_json::to_value(p.default.to_value()) {
                data.insert(p.name.to_string(), v);
            }
        }
        match Self::decode(kind, serde_json::Value::Object(data)) {
            Ok(params) => params,
            // Registry defaults always decode; Start is the neutral fallback.
            Err(_) => BlockParams::Start,
        }
    }

    fn decode(kind: BlockKind, data: serde_json::Value) -> Result<BlockParams, CoreError> {
        let malformed = |e: serde_json::Error| CoreError::MalformedBlock {
            kind: kind.as_str().to_string(),
            reason: e.to_string(),
        };
        let data = if data.is_null() {
            serde_json::Value::Object(serde_json::Map::new())
        } else {
            data
        };
        Ok(match kind {
            BlockKind::Input => BlockParams::Input(serde_json::from_value(data).map_err(malformed)?),
            BlockKind::Hidden => {
                BlockParams::Hidden(serde_json::from_value(data).map_err(malformed)?)
            }
            BlockKind::Output => {
                BlockParams::Output(serde_json::from_value(data).map_err(malformed)?)
            }
            BlockKind::Convolutional => {
                BlockParams::Convolutional(serde_json::from_value(data).map_err(malformed)?)
            }
            BlockKind::Pooling => {
                BlockParams::Pooling(serde_json::from_value(data).map_err(malformed)?)
            }
            BlockKind::Classifier => {
                BlockParams::Classifier(serde_json::from_value(data).map_err(malformed)?)
            }
            BlockKind::Training => {
                BlockParams::Training(serde_json::from_value(data).map_err(malformed)?)
            }
            BlockKind::Start => BlockParams::Start,
        })
    }

    /// Decodes the wire form. Unrecognized kinds become
    /// [`BlockParams::Unknown`]; a recognized kind with undecodable data is
    /// an error.
    pub fn from_raw(raw: RawBlock) -> Result<BlockParams, CoreError> {
        match block::lookup(&raw.kind) {
            RegistryEntry::Known(spec) => Self::decode(spec.kind, raw.data),
            RegistryEntry::Unrecognized { kind } => Ok(BlockParams::Unknown {
                kind,
                data: raw.data,
            }),
        }
    }

    /// The registered kind, or `None` for placeholders.
    pub fn kind(&self) -> Option<BlockKind> {
        match self {
            BlockParams::Input(_) => Some(BlockKind::Input),
            BlockParams::Hidden(_) => Some(BlockKind::Hidden),
            BlockParams::Output(_) => Some(BlockKind::Output),
            BlockParams::Convolutional(_) => Some(BlockKind::Convolutional),
            BlockParams::Pooling(_) => Some(BlockKind::Pooling),
            BlockParams::Classifier(_) => Some(BlockKind::Classifier),
            BlockParams::Training(_) => Some(BlockKind::Training),
            BlockParams::Start => Some(BlockKind::Start),
            BlockParams::Unknown { .. } => None,
        }
    }

    /// Editor type string, including the original string of placeholders.
    pub fn kind_name(&self) -> &str {
        match self {
            BlockParams::Unknown { kind, .. } => kind,
            other => other.kind().map(|k| k.as_str()).unwrap_or_default(),
        }
    }

    pub fn family(&self) -> Option<Family> {
        self.kind().and_then(|k| k.family())
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, BlockParams::Unknown { .. })
    }

    /// `(sizeIn, sizeOut)` of neural layers and convolutions.
    pub fn sizes(&self) -> Option<(u32, u32)> {
        match self {
            BlockParams::Input(p) | BlockParams::Output(p) => Some((p.size_in, p.size_out)),
            BlockParams::Hidden(p) => Some((p.size_in, p.size_out)),
            BlockParams::Convolutional(p) => Some((p.size_in, p.size_out)),
            _ => None,
        }
    }

    pub fn size_out(&self) -> Option<u32> {
        self.sizes().map(|(_, out)| out)
    }

    /// Mutable handle on `sizeIn` for layers that have one.
    pub fn size_in_mut(&mut self) -> Option<&mut u32> {
        match self {
            BlockParams::Input(p) | BlockParams::Output(p) => Some(&mut p.size_in),
            BlockParams::Hidden(p) => Some(&mut p.size_in),
            BlockParams::Convolutional(p) => Some(&mut p.size_in),
            _ => None,
        }
    }

    /// Reads a parameter by its editor name.
    pub fn get(&self, param: &str) -> Option<ParamValue> {
        let v = match (self, param) {
            (BlockParams::Input(p) | BlockParams::Output(p), "sizeIn") => p.size_in.into(),
            (BlockParams::Input(p) | BlockParams::Output(p), "sizeOut") => p.size_out.into(),
            (BlockParams::Hidden(p), "sizeIn") => p.size_in.into(),
            (BlockParams::Hidden(p), "sizeOut") => p.size_out.into(),
            (BlockParams::Hidden(p), "activation") => p.activation.as_str().into(),
            (BlockParams::Convolutional(p), "sizeIn") => p.size_in.into(),
            (BlockParams::Convolutional(p), "sizeOut") => p.size_out.into(),
            (BlockParams::Convolutional(p), "kernelSize") => p.kernel_size.into(),
            (BlockParams::Convolutional(p), "padding") => p.padding.into(),
            (BlockParams::Pooling(p), "channels") => p.channels.into(),
            (BlockParams::Pooling(p), "kernelSize") => p.kernel_size.into(),
            (BlockParams::Pooling(p), "stride") => p.stride.into(),
            (BlockParams::Pooling(p), "poolType") => p.pool_type.as_str().into(),
            (BlockParams::Classifier(p), "classes") => ParamValue::Names(p.classes.clone()),
            (BlockParams::Training(p), "epochs") => p.epochs.into(),
            (BlockParams::Training(p), "batchSize") => p.batch_size.into(),
            (BlockParams::Training(p), "learningRate") => p.learning_rate.into(),
            (BlockParams::Training(p), "optimizer") => p.optimizer.as_str().into(),
            (BlockParams::Training(p), "validationSplit") => p.validation_split.into(),
            (BlockParams::Training(p), "shuffle") => p.shuffle.into(),
            _ => return None,
        };
        Some(v)
    }

    /// Writes a user-editable parameter after checking it against the
    /// registry schema. Derived parameters are rejected.
    pub fn set(&mut self, param: &str, value: &ParamValue) -> Result<(), CoreError> {
        let kind = match self.kind() {
            Some(k) => k,
            None => {
                return Err(CoreError::UnknownBlockKind {
                    kind: self.kind_name().to_string(),
                })
            }
        };
        let spec = block::spec(kind)
            .param(param)
            .ok_or_else(|| CoreError::UnknownParameter {
                kind: kind.as_str().to_string(),
                param: param.to_string(),
            })?;
        if !spec.editable {
            return Err(CoreError::ReadOnlyParameter {
                kind: kind.as_str().to_string(),
                param: param.to_string(),
            });
        }
        spec.check(value)?;
        self.write_checked(param, value);
        Ok(())
    }

    /// Stores a value that already passed the domain check.
    fn write_checked(&mut self, param: &str, value: &ParamValue) {
        let n = value.as_u32().unwrap_or_default();
        let x = value.as_f64().unwrap_or_default();
        let s = value.as_str().unwrap_or_default();
        match (self, param) {
            (BlockParams::Input(p) | BlockParams::Output(p), "sizeIn") => p.size_in = n,
            (BlockParams::Input(p) | BlockParams::Output(p), "sizeOut") => p.size_out = n,
            (BlockParams::Hidden(p), "sizeIn") => p.size_in = n,
            (BlockParams::Hidden(p), "sizeOut") => p.size_out = n,
            (BlockParams::Hidden(p), "activation") => {
                p.activation = Activation::parse(s).unwrap_or_default()
            }
            (BlockParams::Convolutional(p), "sizeIn") => p.size_in = n,
            (BlockParams::Convolutional(p), "sizeOut") => p.size_out = n,
            (BlockParams::Convolutional(p), "kernelSize") => p.kernel_size = n,
            (BlockParams::Convolutional(p), "padding") => p.padding = n,
            (BlockParams::Pooling(p), "kernelSize") => p.kernel_size = n,
            (BlockParams::Pooling(p), "stride") => p.stride = n,
            (BlockParams::Pooling(p), "poolType") => {
                p.pool_type = if s == "avg" { PoolType::Avg } else { PoolType::Max }
            }
            (BlockParams::Classifier(p), "classes") => {
                p.classes = value.as_names().map(|v| v.to_vec()).unwrap_or_default()
            }
            (BlockParams::Training(p), "epochs") => p.epochs = n,
            (BlockParams::Training(p), "batchSize") => p.batch_size = n,
            (BlockParams::Training(p), "learningRate") => p.learning_rate = x,
            (BlockParams::Training(p), "optimizer") => {
                p.optimizer = match s {
                    "sgd" => Optimizer::Sgd,
                    "rmsprop" => Optimizer::Rmsprop,
                    "adagrad" => Optimizer::Adagrad,
                    _ => Optimizer::Adam,
                }
            }
            (BlockParams::Training(p), "validationSplit") => p.validation_split = x,
            (BlockParams::Training(p), "shuffle") => p.shuffle = value.as_bool().unwrap_or(true),
            _ => {}
        }
    }

    /// Domain violations of the current values, one message per parameter.
    pub fn domain_violations(&self) -> Vec<CoreError> {
        let Some(kind) = self.kind() else {
            return Vec::new();
        };
        block::spec(kind)
            .params
            .iter()
            .filter_map(|p| self.get(p.name).and_then(|v| p.check(&v).err()))
            .collect()
    }
}

impl From<BlockParams> for RawBlock {
    fn from(params: BlockParams) -> Self {
        let kind = params.kind_name().to_string();
        let data = match params {
            BlockParams::Input(p) | BlockParams::Output(p) => serde_json::to_value(p),
            BlockParams::Hidden(p) => serde_json::to_value(p),
            BlockParams::Convolutional(p) => serde_json::to_value(p),
            BlockParams::Pooling(p) => serde_json::to_value(p),
            BlockParams::Classifier(p) => serde_json::to_value(p),
            BlockParams::Training(p) => serde_json::to_value(p),
            BlockParams::Start => Ok(serde_json::Value::Object(serde_json::Map::new())),
            BlockParams::Unknown { data, .. } => Ok(data),
        };
        RawBlock {
            kind,
            data: data.unwrap_or(serde_json::Value::Null),
        }
    }
}

impl TryFrom<RawBlock> for BlockParams {
    type Error = CoreError;

    fn try_from(raw: RawBlock) -> Result<Self, Self::Error> {
        BlockParams::from_raw(raw)
    }
}

// ---------------------------------------------------------------------------
// Node
// ---------------------------------------------------------------------------

/// Canvas coordinates; editor metadata only.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A block in the architecture graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    /// Position within the node's family. Ignored for control blocks.
    #[serde(default)]
    pub sequence_index: u32,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(flatten)]
    pub params: BlockParams,
}

impl Node {
    pub fn new(id: impl Into<NodeId>, sequence_index: u32, params: BlockParams) -> Self {
        let label = params
            .kind()
            .map(|k| block::spec(k).label.to_string())
            .unwrap_or_default();
        Node {
            id: id.into(),
            sequence_index,
            label,
            position: None,
            params,
        }
    }

    pub fn kind(&self) -> Option<BlockKind> {
        self.params.kind()
    }

    pub fn family(&self) -> Option<Family> {
        self.params.family()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn defaults_follow_registry() {
        match BlockParams::default_for(BlockKind::Pooling) {
            BlockParams::Pooling(p) => {
                assert_eq!(p.channels, 32);
                assert_eq!(p.kernel_size, 2);
                assert_eq!(p.stride, 2);
                assert_eq!(p.pool_type, PoolType::Max);
            }
            other => panic!("expected pooling params, got {:?}", other),
        }
        match BlockParams::default_for(BlockKind::Training) {
            BlockParams::Training(t) => assert_eq!(t, TrainingConfig::default()),
            other => panic!("expected training params, got {:?}", other),
        }
        assert_eq!(BlockParams::default_for(BlockKind::Start), BlockParams::Start);
    }

    #[test]
    fn node_wire_shape_is_flat() {
        let node = Node::new(
            "conv-1",
            0,
            BlockParams::Convolutional(ConvParams {
                size_in: 3,
                size_out: 64,
                kernel_size: 3,
                padding: 1,
            }),
        );
        let v = serde_json::to_value(&node).unwrap();
        assert_eq!(v["id"], "conv-1");
        assert_eq!(v["type"], "convolutionalBlock");
        assert_eq!(v["sequenceIndex"], 0);
        assert_eq!(v["data"]["sizeOut"], 64);
        assert_eq!(v["data"]["kernelSize"], 3);

        let back: Node = serde_json::from_value(v).unwrap();
        assert_eq!(back, node);
    }

    #[test]
    fn unknown_kind_is_kept_verbatim() {
        let v = json!({
            "id": "note-1",
            "type": "textBlock",
            "data": { "text": "remember to normalize" }
        });
        let node: Node = serde_json::from_value(v).unwrap();
        assert!(node.params.is_unknown());
        assert_eq!(node.params.kind_name(), "textBlock");
        assert_eq!(node.kind(), None);

        let out = serde_json::to_value(&node).unwrap();
        assert_eq!(out["type"], "textBlock");
        assert_eq!(out["data"]["text"], "remember to normalize");
    }

    #[test]
    fn known_kind_with_bad_data_fails() {
        let v = json!({ "id": "c", "type": "convolutionalBlock", "data": { "sizeIn": "three" } });
        assert!(serde_json::from_value::<Node>(v).is_err());
    }

    #[test]
    fn missing_optional_fields_take_defaults() {
        let v = json!({ "id": "p", "type": "poolingBlock", "data": { "channels": 16, "kernelSize": 2, "stride": 1 } });
        let node: Node = serde_json::from_value(v).unwrap();
        assert_eq!(node.params.get("poolType"), Some(ParamValue::from("max")));
        assert_eq!(node.sequence_index, 0);

        let t: Node = serde_json::from_value(json!({ "id": "t", "type": "trainingBlock", "data": { "epochs": 3 } })).unwrap();
        assert_eq!(t.params.get("epochs"), Some(ParamValue::Int(3)));
        assert_eq!(t.params.get("batchSize"), Some(ParamValue::Int(32)));
    }

    #[test]
    fn legacy_editor_field_names_decode() {
        let v = json!({ "id": "pool-1", "type": "poolingBlock", "data": { "size": 3, "type": "avg", "channels": 32 } });
        let node: Node = serde_json::from_value(v).unwrap();
        match node.params {
            BlockParams::Pooling(p) => {
                assert_eq!(p.kernel_size, 3);
                assert_eq!(p.stride, 2);
                assert_eq!(p.pool_type, PoolType::Avg);
            }
            other => panic!("expected pooling params, got {:?}", other),
        }

        let v = json!({ "id": "conv-1", "type": "convBlock", "data": { "size": 5, "sizeIn": 3, "sizeOut": 16 } });
        let node: Node = serde_json::from_value(v).unwrap();
        assert_eq!(node.params.get("kernelSize"), Some(ParamValue::Int(5)));
        assert_eq!(node.params.get("padding"), Some(ParamValue::Int(0)));
    }

    #[test]
    fn set_checks_schema() {
        let mut p = BlockParams::default_for(BlockKind::Pooling);
        p.set("stride", &ParamValue::Int(1)).unwrap();
        assert_eq!(p.get("stride"), Some(ParamValue::Int(1)));

        assert!(matches!(
            p.set("channels", &ParamValue::Int(8)),
            Err(CoreError::ReadOnlyParameter { .. })
        ));
        assert!(matches!(
            p.set("padding", &ParamValue::Int(1)),
            Err(CoreError::UnknownParameter { .. })
        ));
        assert!(matches!(
            p.set("kernelSize", &ParamValue::Int(0)),
            Err(CoreError::InvalidParameterValue { .. })
        ));
    }

    #[test]
    fn training_config_validation() {
        assert!(TrainingConfig::default().validate().is_ok());
        let bad = TrainingConfig {
            validation_split: 1.5,
            ..TrainingConfig::default()
        };
        assert!(matches!(
            bad.validate(),
            Err(CoreError::InvalidParameterValue { ref param, .. }) if param == "validationSplit"
        ));
        let json = serde_json::to_value(TrainingConfig::default()).unwrap();
        assert_eq!(json["batchSize"], 32);
        assert_eq!(json["optimizer"], "adam");
        assert_eq!(json["validationSplit"], 0.2);
    }

    #[test]
    fn set_on_unknown_block_is_rejected() {
        let mut p = BlockParams::Unknown {
            kind: "codeBlock".into(),
            data: json!({}),
        };
        assert!(matches!(
            p.set("sizeIn", &ParamValue::Int(1)),
            Err(CoreError::UnknownBlockKind { ref kind }) if kind == "codeBlock"
        ));
    }

    #[test]
    fn set_enum_params() {
        let mut h = BlockParams::default_for(BlockKind::Hidden);
        h.set("activation", &"tanh".into()).unwrap();
        assert_eq!(h.get("activation"), Some(ParamValue::from("tanh")));

        let mut t = BlockParams::default_for(BlockKind::Training);
        t.set("optimizer", &"sgd".into()).unwrap();
        t.set("learningRate", &ParamValue::Float(0.01)).unwrap();
        match t {
            BlockParams::Training(tp) => {
                assert_eq!(tp.optimizer, Optimizer::Sgd);
                assert_eq!(tp.learning_rate, 0.01);
            }
            _ => unreachable!(),
        }
    }

    #[test]
    fn domain_violations_report_zero_sizes() {
        let p = BlockParams::Convolutional(ConvParams {
            size_in: 3,
            size_out: 0,
            kernel_size: 3,
            padding: 0,
        });
        let v = p.domain_violations();
        assert_eq!(v.len(), 1);
        assert!(matches!(&v[0], CoreError::InvalidParameterValue { param, .. } if param == "sizeOut"));
    }
}
