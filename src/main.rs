//! `tilecore` - a small CLI around the library, for manually inspecting a
//! source and extracting a thumbnail or tile without a server around it.

use std::process::ExitCode;

use async_trait::async_trait;
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tilecore::config::Cli;
use tilecore::io::LocalFileReader;
use tilecore::registry::{SourceOpener, SourceRegistry};
use tilecore::source::{ThumbnailOptions, TileSource};
use tilecore::SourceError;

/// Opens sources directly from the local filesystem by absolute path.
struct LocalOpener;

#[async_trait]
impl SourceOpener for LocalOpener {
    type Reader = LocalFileReader;

    async fn create_reader(&self, source_id: &str) -> Result<Self::Reader, SourceError> {
        LocalFileReader::open(source_id)
            .await
            .map_err(SourceError::IoError)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let registry = SourceRegistry::new(LocalOpener);
    let path = cli.path.to_string_lossy().to_string();

    let source = match registry.get_source(&path).await {
        Ok(source) => source,
        Err(err) => {
            error!("failed to open '{path}': {err}");
            return ExitCode::FAILURE;
        }
    };

    let metadata = source.metadata();
    info!(
        "{path}: {}x{} pixels, {} level(s), tile {}x{}, magnification={:?}",
        metadata.size_x,
        metadata.size_y,
        metadata.levels,
        metadata.tile_width,
        metadata.tile_height,
        metadata.magnification
    );

    let Some(output) = cli.output.as_ref() else {
        return ExitCode::SUCCESS;
    };

    let format = cli.format.into();
    let result = if cli.thumbnail {
        source
            .get_thumbnail(&ThumbnailOptions {
                max_width: cli.max_size,
                max_height: cli.max_size,
                format,
                jpeg_quality: cli.jpeg_quality,
            })
            .await
    } else {
        match source.get_tile(cli.level, cli.tile_x, cli.tile_y).await {
            Ok(tile) => encode_tile(tile, format, cli.jpeg_quality).await,
            Err(err) => Err(err),
        }
    };

    let encoded = match result {
        Ok(encoded) => encoded,
        Err(err) => {
            error!("failed to render output: {err}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(err) = tokio::fs::write(output, &encoded.bytes).await {
        error!("failed to write '{}': {err}", output.display());
        return ExitCode::FAILURE;
    }

    info!(
        "wrote {}x{} {} to {}",
        encoded.width,
        encoded.height,
        encoded.mime_type,
        output.display()
    );

    ExitCode::SUCCESS
}

async fn encode_tile(
    tile: tilecore::source::Tile,
    format: tilecore::source::TileFormat,
    jpeg_quality: u8,
) -> Result<tilecore::source::EncodedImage, SourceError> {
    use bytes::Bytes;

    let width = tile.width;
    let height = tile.height;
    let image = tile.image;

    let bytes = tokio::task::spawn_blocking(move || -> Result<Vec<u8>, String> {
        let mut buf = Vec::new();
        match format {
            tilecore::source::TileFormat::Jpeg => {
                let mut encoder =
                    image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buf, jpeg_quality);
                encoder.encode_image(&image).map_err(|e| e.to_string())?;
            }
            tilecore::source::TileFormat::Png => {
                image
                    .write_to(&mut std::io::Cursor::new(&mut buf), image::ImageFormat::Png)
                    .map_err(|e| e.to_string())?;
            }
        }
        Ok(buf)
    })
    .await
    .map_err(|e| SourceError::DecodeFailed(e.to_string()))?
    .map_err(SourceError::DecodeFailed)?;

    Ok(tilecore::source::EncodedImage {
        bytes: Bytes::from(bytes),
        mime_type: format.mime_type(),
        width,
        height,
    })
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tilecore=debug"
    } else {
        "tilecore=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}
