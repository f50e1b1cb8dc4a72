//! Demo blocks shared by every page.

use trellis_core::{Block, FrameworkBuilder};

/// Register the layout blocks loaded through `autoload.blocks`
pub fn register(builder: FrameworkBuilder) -> FrameworkBuilder {
    builder
        .block("head", |templates| {
            Block::named("head").with_template(templates, "shared.head")
        })
        .block("header", |templates| {
            Block::named("header").with_template(templates, "shared.header")
        })
        .block("footer", |templates| {
            let mut block = Block::named("footer").with_template(templates, "shared.footer");
            block.compress_output(true);
            block
        })
}
