pub mod data_uri;
pub mod image_codec;
pub mod image_file_writer;
