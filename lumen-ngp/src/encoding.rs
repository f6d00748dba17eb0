//! Learned multiresolution hash-grid features.

use burn::module::{Module, Param};
use burn::nn::Initializer;
use burn::prelude::*;

use lumen_field::HashGridConfig;

/// Per-axis prime multipliers of the Instant-NGP spatial hash. The first
/// axis is left unmultiplied.
const HASH_PRIMES: [i64; 7] = [
    1,
    2_654_435_761,
    805_459_861,
    3_674_653_429,
    2_097_192_037,
    1_434_869_437,
    2_165_219_737,
];

/// Largest input dimension the spatial hash has primes for.
pub const MAX_INPUT_DIM: usize = HASH_PRIMES.len();

/// Multiresolution hash-grid encoder.
///
/// Each level owns one learned `table_size x features_per_level` table.
/// A lookup scales the input to the level's resolution, hashes the `2^D`
/// surrounding lattice corners, and blends the gathered feature rows with
/// multilinear weights. Levels are concatenated into the output features.
#[derive(Module, Debug)]
pub struct HashGridEncoding<B: Backend> {
    tables: Vec<Param<Tensor<B, 2>>>,
    resolutions: Vec<usize>,
    features_per_level: usize,
    table_size: usize,
    input_dim: usize,
}

impl<B: Backend> HashGridEncoding<B> {
    /// Allocate the per-level tables on `device`, uniform-initialized in
    /// `±1e-4` so a fresh encoder is close to silent.
    pub fn new(config: &HashGridConfig, input_dim: usize, device: &B::Device) -> Self {
        let initializer = Initializer::Uniform {
            min: -1e-4,
            max: 1e-4,
        };
        let tables = (0..config.levels)
            .map(|_| {
                initializer.init([config.table_size(), config.features_per_level], device)
            })
            .collect();
        let resolutions = (0..config.levels).map(|l| config.resolution(l)).collect();

        Self {
            tables,
            resolutions,
            features_per_level: config.features_per_level,
            table_size: config.table_size(),
            input_dim,
        }
    }

    /// Feature width of the encoder output.
    pub fn output_dim(&self) -> usize {
        self.tables.len() * self.features_per_level
    }

    /// Spatial dimension the encoder was built for.
    pub fn input_dim(&self) -> usize {
        self.input_dim
    }

    /// Encode a `[N, input_dim]` batch of unit-cube coordinates into
    /// `[N, levels * features_per_level]` features.
    pub fn forward(&self, x: Tensor<B, 2>) -> Tensor<B, 2> {
        let device = x.device();
        let [n, dim] = x.dims();
        let corners = 1usize << dim;

        let mut levels = Vec::with_capacity(self.tables.len());
        for (table, &resolution) in self.tables.iter().zip(self.resolutions.iter()) {
            let scaled = x.clone().mul_scalar(resolution as f32);
            let cell = scaled.clone().floor();
            let frac = scaled - cell.clone();
            let cell = cell.int();

            let mut blended = Tensor::<B, 2>::zeros([n, self.features_per_level], &device);
            for corner in 0..corners {
                let offsets: Vec<i64> = (0..dim)
                    .map(|axis| ((corner >> axis) & 1) as i64)
                    .collect();
                let offsets =
                    Tensor::<B, 1, Int>::from_data(TensorData::new(offsets, [dim]), &device)
                        .unsqueeze::<2>();

                let indices = self.hash(cell.clone() + offsets);
                let features = table.val().select(0, indices);

                // Multilinear weight: the corner's share of the cell.
                let mut weight = Tensor::<B, 2>::ones([n, 1], &device);
                for axis in 0..dim {
                    let f = frac.clone().narrow(1, axis, 1);
                    let w = if (corner >> axis) & 1 == 1 {
                        f
                    } else {
                        f.neg().add_scalar(1.0)
                    };
                    weight = weight * w;
                }
                blended = blended + features * weight;
            }
            levels.push(blended);
        }
        Tensor::cat(levels, 1)
    }

    /// Instant-NGP spatial hash, `[N, D]` lattice coordinates to `[N]`
    /// table rows. Masking with the power-of-two table size keeps the
    /// result in range for any integer input, negatives included.
    fn hash(&self, coords: Tensor<B, 2, Int>) -> Tensor<B, 1, Int> {
        let [_, dim] = coords.dims();
        let mut h = coords.clone().narrow(1, 0, 1);
        for axis in 1..dim {
            let term = coords
                .clone()
                .narrow(1, axis, 1)
                .mul_scalar(HASH_PRIMES[axis]);
            h = h.bitwise_xor(term);
        }
        h.bitwise_and_scalar((self.table_size as i64 - 1).elem::<B::IntElem>())
            .squeeze(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type B = burn::backend::NdArray;
    type AD = burn::backend::Autodiff<B>;

    fn small_config() -> HashGridConfig {
        HashGridConfig::new()
            .with_levels(4)
            .with_log2_hashmap_size(10)
    }

    #[test]
    fn test_encoding_output_shape() {
        let device = Default::default();
        let encoding = HashGridEncoding::<B>::new(&small_config(), 3, &device);

        let x = Tensor::<B, 2>::from_floats(
            [[0.1, 0.2, 0.3], [0.9, 0.5, 0.0], [0.5, 0.5, 0.5]],
            &device,
        );
        let out = encoding.forward(x);
        assert_eq!(out.dims(), [3, 8]);
        assert_eq!(encoding.output_dim(), 8);
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let device = Default::default();
        let encoding = HashGridEncoding::<B>::new(&small_config(), 3, &device);

        let x = Tensor::<B, 2>::from_floats([[0.25, 0.75, 0.5]], &device);
        let a = encoding
            .forward(x.clone())
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        let b = encoding.forward(x).into_data().to_vec::<f32>().unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_encoding_distinguishes_points() {
        let device = Default::default();
        let encoding = HashGridEncoding::<B>::new(&small_config(), 3, &device);

        let x = Tensor::<B, 2>::from_floats(
            [[0.11, 0.52, 0.93], [0.78, 0.24, 0.41]],
            &device,
        );
        let out = encoding.forward(x).into_data().to_vec::<f32>().unwrap();
        let (first, second) = out.split_at(out.len() / 2);
        assert_ne!(first, second);
    }

    #[test]
    fn test_encoding_handles_out_of_range_coordinates() {
        // Fields mask invalid points after the backbone runs, so the
        // encoder still sees their coordinates and must stay in-range.
        let device = Default::default();
        let encoding = HashGridEncoding::<B>::new(&small_config(), 3, &device);

        let x = Tensor::<B, 2>::from_floats([[-0.5, 1.5, 42.0]], &device);
        let out = encoding.forward(x).into_data().to_vec::<f32>().unwrap();
        for v in out {
            assert!(v.is_finite());
        }
    }

    #[test]
    fn test_encoding_gradients_reach_tables() {
        let device = Default::default();
        let encoding = HashGridEncoding::<AD>::new(&small_config(), 3, &device);

        let x = Tensor::<AD, 2>::from_floats([[0.3, 0.6, 0.9]], &device);
        let grads = encoding.forward(x).sum().backward();

        let table_grad = encoding.tables[0].val().grad(&grads);
        assert!(table_grad.is_some());
    }
}
