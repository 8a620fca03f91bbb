//! # `ResNet` Layer Block
//!
//! A [`LayerBlock`] is a run of [`BasicBlock`]s at one resolution; only the
//! first block strides and widens.

use crate::models::resnet::basic_block::{BasicBlock, BasicBlockConfig};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// [`LayerBlock`] configuration.
#[derive(Config, Debug)]
pub struct LayerBlockConfig {
    /// The component blocks.
    pub blocks: Vec<BasicBlockConfig>,
}

impl LayerBlockConfig {
    /// `num_blocks` blocks mapping `in_planes` to `out_planes` at `stride`.
    pub fn build(
        num_blocks: usize,
        in_planes: usize,
        out_planes: usize,
        stride: usize,
    ) -> Self {
        let mut blocks = Vec::with_capacity(num_blocks);
        if num_blocks > 0 {
            blocks.push(BasicBlockConfig::new(in_planes, out_planes).with_stride(stride));
        }
        blocks.extend((1..num_blocks).map(|_| BasicBlockConfig::new(out_planes, out_planes)));
        Self { blocks }
    }

    /// Output width.
    pub fn out_planes(&self) -> Option<usize> {
        self.blocks.last().map(|block| block.out_planes)
    }

    /// Check the blocks are non-empty and chain by width.
    pub fn try_validate(&self) -> Result<(), String> {
        if self.blocks.is_empty() {
            return Err("layer block has no blocks".to_string());
        }
        for (idx, pair) in self.blocks.windows(2).enumerate() {
            if pair[0].out_planes != pair[1].in_planes {
                return Err(format!(
                    "block {} emits {} planes but block {} takes {}",
                    idx,
                    pair[0].out_planes,
                    idx + 1,
                    pair[1].in_planes,
                ));
            }
        }
        Ok(())
    }

    /// Initialize a [`LayerBlock`].
    ///
    /// # Panics
    ///
    /// If [`Self::try_validate`] fails.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> LayerBlock<B> {
        if let Err(err) = self.try_validate() {
            panic!("{err}");
        }
        LayerBlock {
            blocks: self
                .blocks
                .into_iter()
                .map(|block| block.init(device))
                .collect(),
        }
    }
}

/// A run of residual blocks.
#[derive(Module, Debug)]
pub struct LayerBlock<B: Backend> {
    /// Residual blocks, in order.
    pub blocks: Vec<BasicBlock<B>>,
}

impl<B: Backend> LayerBlock<B> {
    /// Apply each block in turn.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.blocks.iter().fold(input, |x, block| block.forward(x))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    #[test]
    fn test_build_strides_first_block_only() {
        let config = LayerBlockConfig::build(3, 8, 16, 2);
        let strides: Vec<usize> = config.blocks.iter().map(|b| b.stride).collect();
        assert_eq!(strides, vec![2, 1, 1]);
        assert_eq!(config.out_planes(), Some(16));
        assert!(config.try_validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_broken_chains() {
        let config = LayerBlockConfig::new(vec![
            BasicBlockConfig::new(4, 8),
            BasicBlockConfig::new(4, 8),
        ]);
        assert_eq!(
            config.try_validate(),
            Err("block 0 emits 8 planes but block 1 takes 4".to_string())
        );
        assert!(LayerBlockConfig::build(0, 4, 4, 1).try_validate().is_err());
    }

    #[test]
    fn test_forward_shape() {
        let device = Default::default();
        let block: LayerBlock<NdArray<f32>> = LayerBlockConfig::build(2, 2, 4, 2).init(&device);
        let output = block.forward(Tensor::ones([1, 2, 8, 8], &device));
        assert_eq!(output.dims(), [1, 4, 4, 4]);
    }
}
