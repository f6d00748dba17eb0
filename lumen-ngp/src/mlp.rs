//! Feed-forward network stage.

use burn::module::{Ignored, Module};
use burn::nn::{Linear, LinearConfig};
use burn::prelude::*;

use lumen_field::{Activation, MlpConfig};

/// Linear stack with configurable hidden and output activations.
#[derive(Module, Debug)]
pub struct Mlp<B: Backend> {
    layers: Vec<Linear<B>>,
    activation: Ignored<Activation>,
    output_activation: Ignored<Activation>,
}

impl<B: Backend> Mlp<B> {
    /// Allocate `hidden_layers + 1` linear layers on `device`.
    pub fn new(
        config: &MlpConfig,
        input_dim: usize,
        output_dim: usize,
        device: &B::Device,
    ) -> Self {
        let mut layers = Vec::with_capacity(config.hidden_layers + 1);
        let mut width = input_dim;
        for _ in 0..config.hidden_layers {
            layers.push(LinearConfig::new(width, config.hidden_size).init(device));
            width = config.hidden_size;
        }
        layers.push(LinearConfig::new(width, output_dim).init(device));

        Self {
            layers,
            activation: Ignored(config.activation),
            output_activation: Ignored(config.output_activation),
        }
    }

    /// Run the stack on a `[N, input_dim]` batch.
    pub fn forward(&self, mut x: Tensor<B, 2>) -> Tensor<B, 2> {
        let last = self.layers.len() - 1;
        for (index, layer) in self.layers.iter().enumerate() {
            x = layer.forward(x);
            x = if index == last {
                self.output_activation.apply(x)
            } else {
                self.activation.apply(x)
            };
        }
        x
    }
}
