use std::fs::OpenOptions;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use image::GenericImageView;

use crate::error::{EngineError, EngineResult};
use crate::shared::frame::Frame;
use crate::sink::{EventContext, EventRecord, EventSink};

const CSV_HEADER: &str = "image_id,timestamp,feature,status,data_path,image_path\n";

/// Writes Event Record evidence (image crop, JSON, CSV row, optional
/// dashboard-status JSON) to a directory tree under `<out>/...` (spec §4.6),
/// grounded in `original_source/yoi/components/engine_output_lifecycle.py`.
pub struct FileEventSink {
    output_dir: PathBuf,
    image_dir: PathBuf,
    data_dir: PathBuf,
    status_dir: PathBuf,
    csv_path: PathBuf,
    event_counter: u32,
    source_name: String,
    cctv_id: String,
}

impl FileEventSink {
    pub fn new(
        output_dir: PathBuf,
        image_folder: &str,
        data_folder: &str,
        status_folder: &str,
        csv_file: &str,
        source_name: String,
        cctv_id: String,
    ) -> Self {
        let image_dir = output_dir.join(image_folder);
        let data_dir = output_dir.join(data_folder);
        let status_dir = output_dir.join(status_folder);
        let csv_path = output_dir.join(csv_file);
        Self {
            output_dir,
            image_dir,
            data_dir,
            status_dir,
            csv_path,
            event_counter: 0,
            source_name,
            cctv_id,
        }
    }

    fn timestamp_now() -> String {
        chrono::Utc::now().to_rfc3339()
    }

    /// Crops the unannotated frame to `bbox` (clipped to frame bounds);
    /// falls back to the full annotated frame when the crop is degenerate
    /// (spec §4.6 step 2).
    fn build_crop(frame: &Frame, annotated_frame: &Frame, bbox: Option<[f64; 4]>) -> image::RgbImage {
        if let Some([x1, y1, x2, y2]) = bbox {
            let fw = frame.width() as f64;
            let fh = frame.height() as f64;
            let cx1 = x1.clamp(0.0, fw);
            let cy1 = y1.clamp(0.0, fh);
            let cx2 = x2.clamp(0.0, fw);
            let cy2 = y2.clamp(0.0, fh);
            let w = (cx2 - cx1).round() as i64;
            let h = (cy2 - cy1).round() as i64;
            if w > 0 && h > 0 {
                if let Some(img) =
                    image::RgbImage::from_raw(frame.width(), frame.height(), frame.data().to_vec())
                {
                    let view = img.view(cx1.round() as u32, cy1.round() as u32, w as u32, h as u32);
                    return view.to_image();
                }
            }
        }
        image::RgbImage::from_raw(
            annotated_frame.width(),
            annotated_frame.height(),
            annotated_frame.data().to_vec(),
        )
        .unwrap_or_else(|| image::RgbImage::new(1, 1))
    }

    fn append_csv(&self, record: &EventRecord) {
        let line = format!(
            "{},{},{},{},{},{}\n",
            record.image_id,
            record.timestamp,
            record.feature,
            record.alert_kind,
            record.data_path,
            record.image_path
        );
        match OpenOptions::new().append(true).open(&self.csv_path) {
            Ok(mut file) => {
                if let Err(err) = file.write_all(line.as_bytes()) {
                    log::warn!("failed to append event row to {}: {err}", self.csv_path.display());
                }
            }
            Err(err) => {
                log::warn!("failed to open event csv {}: {err}", self.csv_path.display());
            }
        }
    }
}

impl EventSink for FileEventSink {
    fn init(&mut self) -> EngineResult<()> {
        for dir in [&self.output_dir, &self.image_dir, &self.data_dir, &self.status_dir] {
            std::fs::create_dir_all(dir)
                .map_err(|err| EngineError::Initialization(format!("creating {}: {err}", dir.display())))?;
        }
        std::fs::write(&self.csv_path, CSV_HEADER)
            .map_err(|err| EngineError::Initialization(format!("writing {}: {err}", self.csv_path.display())))?;
        Ok(())
    }

    fn record(&mut self, ctx: EventContext<'_>) -> EngineResult<()> {
        self.event_counter += 1;
        let timestamp = Self::timestamp_now();
        let image_id = format!(
            "{:06}_{:04}_{}_{}",
            ctx.alert.frame, self.event_counter, ctx.feature, ctx.alert.kind
        );

        let image_rel = format!("image/{image_id}.jpg");
        let data_rel = format!("data/{image_id}.json");

        let image_path = self.image_dir.join(format!("{image_id}.jpg"));
        let data_path = self.data_dir.join(format!("{image_id}.json"));
        let status_path = self.status_dir.join(format!("{image_id}.json"));

        let crop = Self::build_crop(ctx.frame, ctx.annotated_frame, ctx.track_bbox);
        if let Err(err) = crop.save(&image_path) {
            log::warn!("failed to save event image {}: {err}", image_path.display());
        }

        let record = EventRecord {
            image_id: image_id.clone(),
            timestamp: timestamp.clone(),
            feature: ctx.feature.to_string(),
            alert_kind: ctx.alert.kind.clone(),
            frame_idx: ctx.alert.frame,
            track_id: ctx.alert.track_id,
            source_name: self.source_name.clone(),
            cctv_id: self.cctv_id.clone(),
            alert: ctx.alert.clone(),
            metrics: ctx.metrics.clone(),
            image_path: image_rel.clone(),
            data_path: data_rel.clone(),
        };

        match serde_json::to_string_pretty(&record) {
            Ok(json) => {
                if let Err(err) = std::fs::write(&data_path, json) {
                    log::warn!("failed to write event data {}: {err}", data_path.display());
                }
            }
            Err(err) => log::warn!("failed to serialize event record {image_id}: {err}"),
        }

        if ctx.is_live {
            let status_payload = serde_json::json!({
                "image_id": image_id,
                "timestamp": timestamp,
                "feature": ctx.feature,
                "status": ctx.alert.kind,
                "data_path": data_rel,
                "image_path": image_rel,
                "sent_to_dashboard": false,
            });
            match serde_json::to_string_pretty(&status_payload) {
                Ok(json) => {
                    if let Err(err) = std::fs::write(&status_path, json) {
                        log::warn!("failed to write status file {}: {err}", status_path.display());
                    }
                }
                Err(err) => log::warn!("failed to serialize status payload {image_id}: {err}"),
            }
        }

        self.append_csv(&record);
        Ok(())
    }
}
