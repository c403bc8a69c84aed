pub mod video_view;
