pub mod camera {
    pub mod domain {
        pub mod camera_state;
        pub mod capture_device;
    }
    pub mod camera_manager;
    pub mod device_id;
    pub mod frame_stream;
    pub mod infrastructure;
    pub mod overlay;
    pub mod shared_camera;
}

pub mod classification {
    pub mod emotion_classifier;
    pub mod preprocess;
}

pub mod detection {
    pub mod domain {
        pub mod face_detection_stage;
        pub mod face_detector;
    }
    pub mod infrastructure;
}

pub mod inference {
    pub mod domain {
        pub mod inference_engine;
    }
    pub mod infrastructure;
}

pub mod media {
    pub mod domain {
        pub mod image_writer;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod emotion_analyzer;
    pub mod frame_analyzer;
}

pub mod shared {
    pub mod analysis_result;
    pub mod bounding_box;
    pub mod constants;
    pub mod emotion;
    pub mod error;
    pub mod frame;
}

pub mod stats {
    pub mod aggregated_statistics;
    pub mod analysis_store;
    pub mod analysis_summary;
    pub mod historical_record;
}
