pub mod shared {
    pub mod constants;
    pub mod error;
    pub mod execution_provider;
    pub mod face_detection;
    pub mod frame;
    pub mod model_resolver;
    pub mod video_metadata;
}

pub mod video {
    pub mod domain {
        pub mod frame_sampler;
        pub mod video_error;
        pub mod video_reader;
    }
    pub mod infrastructure;
}

pub mod detection {
    pub mod domain {
        pub mod face_locator;
        pub mod face_selection;
    }
    pub mod infrastructure;
}

pub mod classification {
    pub mod domain {
        pub mod face_classifier;
        pub mod face_preprocessor;
        pub mod score_aggregator;
    }
    pub mod infrastructure;
}

pub mod pipeline {
    pub mod pipeline_logger;
    pub mod predict_video_use_case;
}
