// Results archive: combined.jpg, answer.jpg and a short message.txt

use std::io::{Cursor, Write};
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::core::errors::{ArchiveError, ArchiveResult};
use crate::core::types::ZipRequest;
use crate::utils::image_ops::decode_data_url;

pub const ARCHIVE_NAME: &str = "results.zip";
pub const COMBINED_ENTRY: &str = "combined.jpg";
pub const ANSWER_ENTRY: &str = "answer.jpg";
pub const MESSAGE_ENTRY: &str = "message.txt";

pub const MESSAGE_TEXT: &str = "Thank you for using our Find the Difference puzzles!\n\n\
Inside this archive:\n\
  combined.jpg - the puzzle, original and modified side by side\n\
  answer.jpg   - the solution, every difference circled and numbered\n\n\
Have a great day and keep exploring!";

/// Bundle the two encoded images and the message into an in-memory zip
pub fn build_results_zip(combined_jpeg: &[u8], answer_jpeg: &[u8]) -> ArchiveResult<Vec<u8>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

    writer.start_file(MESSAGE_ENTRY, options)?;
    writer.write_all(MESSAGE_TEXT.as_bytes())?;

    // JPEG is already compressed
    let stored = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    writer.start_file(COMBINED_ENTRY, stored)?;
    writer.write_all(combined_jpeg)?;
    writer.start_file(ANSWER_ENTRY, stored)?;
    writer.write_all(answer_jpeg)?;

    Ok(writer.finish()?.into_inner())
}

/// Build the archive from the data URLs a client got back from `/process`
pub fn zip_from_request(request: &ZipRequest) -> ArchiveResult<Vec<u8>> {
    let combined = decode_data_url(&request.combined_image).map_err(|source| {
        ArchiveError::InvalidDataUrl {
            entry: COMBINED_ENTRY,
            source,
        }
    })?;
    let answer = decode_data_url(&request.answer_image).map_err(|source| {
        ArchiveError::InvalidDataUrl {
            entry: ANSWER_ENTRY,
            source,
        }
    })?;
    build_results_zip(&combined, &answer)
}
