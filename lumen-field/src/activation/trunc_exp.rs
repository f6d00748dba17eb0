//! Backend extension carrying the overflow-guarded exponential.

use burn::backend::autodiff::{
    Autodiff, NodeID,
    checkpoint::{base::Checkpointer, strategy::CheckpointStrategy},
    grads::Gradients,
    ops::{Backward, Ops, OpsKind},
};
use burn::tensor::ElementConversion;
use burn::tensor::backend::Backend;
use burn::tensor::ops::{FloatTensor, FloatTensorOps};

/// Upper clamp applied to the saved input before the backward-pass
/// exponential. `exp(15)` is the largest gradient scale the op emits.
pub const BACKWARD_INPUT_CLAMP: f32 = 15.0;

/// Backends providing the exact-forward, clamped-backward exponential.
///
/// The forward pass is plain `exp(x)`; it may overflow to infinity for
/// very large inputs, which is accepted behavior rather than a fault.
/// The autodiff wrapper overrides the gradient to
/// `grad * exp(clamp(x, max = 15))` so the chain rule stays finite where
/// the forward already saturates.
///
/// Inner backends opt in with a one-line delegation to `float_exp`, as
/// the NdArray impl below does; [`Autodiff`] then layers the custom
/// gradient on top of any of them.
pub trait StableExpBackend: Backend {
    /// Elementwise `exp` with the clamped-gradient rule under autodiff.
    fn trunc_exp(x: FloatTensor<Self>) -> FloatTensor<Self>;
}

#[cfg(any(test, feature = "ndarray"))]
impl StableExpBackend for burn::backend::NdArray {
    fn trunc_exp(x: FloatTensor<Self>) -> FloatTensor<Self> {
        Self::float_exp(x)
    }
}

impl<B: Backend, C: CheckpointStrategy> StableExpBackend for Autodiff<B, C> {
    fn trunc_exp(x: FloatTensor<Self>) -> FloatTensor<Self> {
        #[derive(Debug)]
        struct TruncExpBackward;

        impl<B: Backend> Backward<B, 1> for TruncExpBackward {
            // The forward input, saved across the forward/backward
            // boundary as a checkpointed node.
            type State = NodeID;

            fn backward(
                self,
                ops: Ops<Self::State, 1>,
                grads: &mut Gradients,
                checkpointer: &mut Checkpointer,
            ) {
                let [node_x] = ops.parents;
                let grad = grads.consume::<B>(&ops.node);

                if let Some(node) = node_x {
                    let x: FloatTensor<B> =
                        checkpointer.retrieve_node_output(ops.state);
                    let clamped =
                        B::float_clamp_max(x, BACKWARD_INPUT_CLAMP.elem());
                    let grad_x = B::float_mul(grad, B::float_exp(clamped));
                    grads.register::<B>(node.id, grad_x);
                }
            }
        }

        match TruncExpBackward
            .prepare::<C>([x.node.clone()])
            .compute_bound()
            .stateful()
        {
            OpsKind::Tracked(mut prep) => {
                let x_state = prep.checkpoint(&x);
                let output = B::float_exp(x.primitive);
                prep.finish(x_state, output)
            }
            OpsKind::UnTracked(prep) => prep.finish(B::float_exp(x.primitive)),
        }
    }
}
