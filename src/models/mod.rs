mod post;

pub use post::{Post, RenderedField};

#[cfg(test)]
pub(crate) use post::sample_post;
