pub mod aligner;
pub mod difference_mask;
pub mod differencer;
pub mod loader;
pub mod ocr;
pub mod region;
pub mod region_detector;
pub mod report_writer;
pub mod template_matcher;
pub mod text_compare;

pub mod utils {
    pub mod image_helper;
}
