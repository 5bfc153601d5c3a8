pub mod rtsp_pusher;
