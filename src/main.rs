//! # photo-cull CLI
//!
//! Command-line interface for the photo culling engine.
//!
//! ## Usage
//! ```bash
//! photo-cull scan ~/Shoots/2024-06-01
//! photo-cull rate ~/Shoots/2024-06-01 IMG_0042 3
//! photo-cull export ~/Shoots/2024-06-01 --target /mnt/nas/photos
//! ```

mod cli;

use photo_cull::Result;

fn main() -> Result<()> {
    cli::run()
}
