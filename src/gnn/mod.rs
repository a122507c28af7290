//! Graph neural network models
//!
//! Three message-passing architectures sharing one contract: a stack of
//! conv layers, each but the last followed by ReLU and dropout. Gradients
//! are computed by hand; [`crate::training::Adam`] applies them.

mod gat;
mod gcn;
pub mod layers;
mod sage;

pub use gat::GatConv;
pub use gcn::{normalized_propagate, GcnConv};
pub use layers::Parameter;
pub use sage::{mean_aggregate, SageConv};

use std::fmt;
use std::str::FromStr;

use ndarray::Array2;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::graph::Adjacency;
use layers::{dropout_mask, relu, relu_backward};

/// Supported message-passing architectures
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Architecture {
    /// Graph convolution (Kipf & Welling)
    Gcn,
    /// Graph attention (Veličković et al.)
    Gat,
    /// GraphSAGE with mean aggregation
    GraphSage,
}

impl Architecture {
    pub fn all() -> Vec<Architecture> {
        vec![Architecture::Gcn, Architecture::Gat, Architecture::GraphSage]
    }

    pub fn name(&self) -> &'static str {
        match self {
            Architecture::Gcn => "GCN",
            Architecture::Gat => "GAT",
            Architecture::GraphSage => "GraphSAGE",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for Architecture {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gcn" => Ok(Architecture::Gcn),
            "gat" => Ok(Architecture::Gat),
            "graphsage" | "sage" => Ok(Architecture::GraphSage),
            _ => Err(Error::UnknownArchitecture(s.to_string())),
        }
    }
}

/// Layer widths and regularization for a [`GnnModel`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModelConfig {
    pub input_dim: usize,
    pub hidden_dim: usize,
    pub output_dim: usize,
    /// Total conv layers, at least 2
    pub num_layers: usize,
    /// Attention heads on GAT hidden layers
    pub heads: usize,
    pub dropout: f64,
}

/// One message-passing layer of any architecture
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConvLayer {
    Gcn(GcnConv),
    Gat(GatConv),
    Sage(SageConv),
}

impl ConvLayer {
    pub fn forward(&mut self, x: &Array2<f64>, adj: &Adjacency) -> Array2<f64> {
        match self {
            ConvLayer::Gcn(layer) => layer.forward(x, adj),
            ConvLayer::Gat(layer) => layer.forward(x, adj),
            ConvLayer::Sage(layer) => layer.forward(x, adj),
        }
    }

    pub fn backward(&mut self, adj: &Adjacency, grad: &Array2<f64>) -> Result<Array2<f64>> {
        match self {
            ConvLayer::Gcn(layer) => layer.backward(adj, grad),
            ConvLayer::Gat(layer) => layer.backward(adj, grad),
            ConvLayer::Sage(layer) => layer.backward(adj, grad),
        }
    }

    pub fn output_dim(&self) -> usize {
        match self {
            ConvLayer::Gcn(layer) => layer.output_dim(),
            ConvLayer::Gat(layer) => layer.output_dim(),
            ConvLayer::Sage(layer) => layer.output_dim(),
        }
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        match self {
            ConvLayer::Gcn(layer) => layer.parameters_mut(),
            ConvLayer::Gat(layer) => layer.parameters_mut(),
            ConvLayer::Sage(layer) => layer.parameters_mut(),
        }
    }
}

/// Values saved during a training forward pass for one hidden layer
#[derive(Debug, Clone)]
struct HiddenCache {
    pre_activation: Array2<f64>,
    mask: Option<Array2<f64>>,
}

/// Stacked GNN producing one embedding per node
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GnnModel {
    architecture: Architecture,
    input_dim: usize,
    layers: Vec<ConvLayer>,
    dropout: f64,
    #[serde(skip)]
    training: bool,
    #[serde(skip)]
    hidden: Vec<HiddenCache>,
}

impl GnnModel {
    pub fn new<R: Rng>(architecture: Architecture, config: &ModelConfig, rng: &mut R) -> Result<Self> {
        let middle = config.num_layers.max(2) - 2;
        let mut layers = Vec::with_capacity(middle + 2);

        match architecture {
            Architecture::Gcn => {
                let mut width = config.input_dim;
                for _ in 0..=middle {
                    layers.push(ConvLayer::Gcn(GcnConv::new(width, config.hidden_dim, rng)));
                    width = config.hidden_dim;
                }
                layers.push(ConvLayer::Gcn(GcnConv::new(width, config.output_dim, rng)));
            }
            Architecture::GraphSage => {
                let mut width = config.input_dim;
                for _ in 0..=middle {
                    layers.push(ConvLayer::Sage(SageConv::new(width, config.hidden_dim, rng)));
                    width = config.hidden_dim;
                }
                layers.push(ConvLayer::Sage(SageConv::new(width, config.output_dim, rng)));
            }
            Architecture::Gat => {
                let heads = config.heads.max(1);
                let head_dim = config.hidden_dim / heads;
                if head_dim == 0 {
                    return Err(Error::Training(format!(
                        "hidden width {} cannot be split across {} heads",
                        config.hidden_dim, heads
                    )));
                }
                let mut width = config.input_dim;
                for _ in 0..=middle {
                    let layer = GatConv::new(width, head_dim, heads, true, rng);
                    width = layer.output_dim();
                    layers.push(ConvLayer::Gat(layer));
                }
                layers.push(ConvLayer::Gat(GatConv::new(width, config.output_dim, 1, false, rng)));
            }
        }

        Ok(Self {
            architecture,
            input_dim: config.input_dim,
            layers,
            dropout: config.dropout,
            training: true,
            hidden: Vec::new(),
        })
    }

    pub fn architecture(&self) -> Architecture {
        self.architecture
    }

    pub fn num_layers(&self) -> usize {
        self.layers.len()
    }

    pub fn layers(&self) -> &[ConvLayer] {
        &self.layers
    }

    pub fn output_dim(&self) -> usize {
        self.layers.last().map(ConvLayer::output_dim).unwrap_or(0)
    }

    pub fn num_parameters(&mut self) -> usize {
        self.parameters_mut().iter().map(|p| p.len()).sum()
    }

    /// Enable dropout
    pub fn train(&mut self) {
        self.training = true;
    }

    /// Disable dropout
    pub fn eval(&mut self) {
        self.training = false;
    }

    pub fn is_training(&self) -> bool {
        self.training
    }

    /// Node embeddings for `x` over `adj`
    pub fn forward<R: Rng>(
        &mut self,
        x: &Array2<f64>,
        adj: &Adjacency,
        rng: &mut R,
    ) -> Result<Array2<f64>> {
        if x.ncols() != self.input_dim {
            return Err(Error::ShapeMismatch {
                context: "model input width",
                expected: self.input_dim,
                got: x.ncols(),
            });
        }
        if adj.num_nodes() != x.nrows() {
            return Err(Error::ShapeMismatch {
                context: "adjacency nodes",
                expected: x.nrows(),
                got: adj.num_nodes(),
            });
        }

        self.hidden.clear();
        let last = self.layers.len() - 1;
        let mut h = x.clone();
        for (idx, layer) in self.layers.iter_mut().enumerate() {
            let z = layer.forward(&h, adj);
            if idx == last {
                h = z;
                break;
            }
            let activated = z.mapv(relu);
            let mask = (self.training && self.dropout > 0.0)
                .then(|| dropout_mask(z.raw_dim(), self.dropout, rng));
            h = match &mask {
                Some(mask) => activated * mask,
                None => activated,
            };
            self.hidden.push(HiddenCache {
                pre_activation: z,
                mask,
            });
        }
        Ok(h)
    }

    /// Backpropagate `grad` (w.r.t. the output embeddings) into every layer
    pub fn backward(&mut self, adj: &Adjacency, grad: &Array2<f64>) -> Result<()> {
        let mut grad = grad.clone();
        for idx in (0..self.layers.len()).rev() {
            grad = self.layers[idx].backward(adj, &grad)?;
            if idx == 0 {
                break;
            }
            let cache = self.hidden.get(idx - 1).ok_or_else(|| {
                Error::Training("backward without a matching training forward pass".to_string())
            })?;
            if let Some(mask) = &cache.mask {
                grad *= mask;
            }
            relu_backward(&mut grad, &cache.pre_activation);
        }
        Ok(())
    }

    pub fn parameters_mut(&mut self) -> Vec<&mut Parameter> {
        self.layers
            .iter_mut()
            .flat_map(|layer| layer.parameters_mut())
            .collect()
    }

    pub fn zero_grad(&mut self) {
        for param in self.parameters_mut() {
            param.zero_grad();
        }
    }
}
