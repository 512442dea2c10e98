// loader.rs - 后台线程加载资源，经通道把进度和结果送回主循环
//
// 两个加载互不依赖，完成顺序不确定；发出后无法取消。

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Sender;
use std::thread;

use crate::environment::EnvironmentMap;
use crate::error::ViewerError;
use crate::loading::{ENVIRONMENT_TASK, MODEL_TASK};
use crate::model::ModelData;

const CHUNK_SIZE: usize = 64 * 1024;

pub enum LoadEvent {
    Progress {
        task: &'static str,
        loaded: u64,
        total: Option<u64>,
    },
    Environment(EnvironmentMap),
    Model(ModelData),
    Failed {
        task: &'static str,
        error: ViewerError,
    },
}

/// Read a whole file, calling `progress(loaded, total)` after every chunk.
pub fn read_with_progress(
    path: &Path,
    mut progress: impl FnMut(u64, Option<u64>),
) -> Result<Vec<u8>, ViewerError> {
    let mut file = File::open(path).map_err(|e| ViewerError::io(path, e))?;
    let total = file.metadata().ok().map(|m| m.len());

    let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
    let mut chunk = vec![0u8; CHUNK_SIZE];
    loop {
        let n = file.read(&mut chunk).map_err(|e| ViewerError::io(path, e))?;
        if n == 0 {
            break;
        }
        bytes.extend_from_slice(&chunk[..n]);
        progress(bytes.len() as u64, total);
    }
    Ok(bytes)
}

pub fn spawn_environment_load(path: PathBuf, tx: Sender<LoadEvent>) {
    thread::spawn(move || {
        log::info!("loading environment map {:?}", path);
        let result = read_with_progress(&path, |loaded, total| {
            let _ = tx.send(LoadEvent::Progress {
                task: ENVIRONMENT_TASK,
                loaded,
                total,
            });
        })
        .and_then(|bytes| EnvironmentMap::decode(&bytes));

        let event = match result {
            Ok(env) => LoadEvent::Environment(env),
            Err(error) => LoadEvent::Failed {
                task: ENVIRONMENT_TASK,
                error,
            },
        };
        if tx.send(event).is_err() {
            log::warn!("viewer closed before environment map finished loading");
        }
    });
}

pub fn spawn_model_load(path: PathBuf, tx: Sender<LoadEvent>) {
    thread::spawn(move || {
        log::info!("loading model {:?}", path);
        let result = read_with_progress(&path, |loaded, total| {
            let _ = tx.send(LoadEvent::Progress {
                task: MODEL_TASK,
                loaded,
                total,
            });
        })
        .and_then(|bytes| ModelData::decode(&bytes, &path));

        let event = match result {
            Ok(model) => LoadEvent::Model(model),
            Err(error) => LoadEvent::Failed {
                task: MODEL_TASK,
                error,
            },
        };
        if tx.send(event).is_err() {
            log::warn!("viewer closed before model finished loading");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::mpsc::channel;
    use std::time::Duration;

    #[test]
    fn progress_reaches_file_size() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        let data = vec![7u8; CHUNK_SIZE * 2 + 10];
        file.write_all(&data).unwrap();

        let mut reports = Vec::new();
        let bytes = read_with_progress(file.path(), |loaded, total| reports.push((loaded, total)))
            .unwrap();
        assert_eq!(bytes, data);
        assert!(reports.len() >= 3);
        assert_eq!(reports.last(), Some(&(data.len() as u64, Some(data.len() as u64))));
    }

    #[test]
    fn missing_file_reports_failure() {
        let (tx, rx) = channel();
        spawn_model_load(PathBuf::from("/nonexistent/DamagedHelmet.gltf"), tx);
        match rx.recv_timeout(Duration::from_secs(5)).unwrap() {
            LoadEvent::Failed { task, error } => {
                assert_eq!(task, MODEL_TASK);
                assert!(matches!(error, ViewerError::Io { .. }));
            }
            _ => panic!("expected a failure event"),
        }
    }
}
