//! 过敏原存储
//!
//! - `AllergenStore` 为扫描引擎与 CRUD 层共用的接口，进程启动时构建一次并以 `Arc` 注入。
//! - `AllergenCatalog` 是自带实现：内存记录 + 可选 JSON 文件持久化（每次变更整体重写，先写临时文件再 rename）。
//! - 每次变更前在写锁内重新读取文件，多个进程（如 `serve` 与 CLI）共用数据目录时不会覆盖彼此的写入。
//! - 记录按插入顺序保存，`find_by_ids` 按存储顺序返回。
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::types::{Allergen, AllergenId, AllergenInput};

/// 持久化文件名（位于数据目录下）
pub const ALLERGENS_FILE: &str = "allergens.json";

pub trait AllergenStore: Send + Sync {
    /// 仅返回存在的记录，顺序为存储顺序
    fn find_by_ids(&self, ids: &[AllergenId]) -> Result<Vec<Allergen>, StoreError>;
    fn list_all(&self) -> Result<Vec<Allergen>, StoreError>;
    fn create(&self, input: AllergenInput) -> Result<Allergen, StoreError>;
    /// 整体替换名称、严重程度与关键词
    fn update(&self, id: &str, input: AllergenInput) -> Result<Allergen, StoreError>;
    fn delete(&self, id: &str) -> Result<(), StoreError>;
}

pub struct AllergenCatalog {
    records: RwLock<Vec<Allergen>>,
    path: Option<PathBuf>,
}

impl AllergenCatalog {
    pub fn in_memory() -> Self {
        Self { records: RwLock::new(Vec::new()), path: None }
    }

    /// 打开（或新建）JSON 文件存储
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let records = load_file(path)?;
        info!(path = %path.display(), count = records.len(), "allergen store opened");
        Ok(Self { records: RwLock::new(records), path: Some(path.to_path_buf()) })
    }

    /// 用磁盘上的最新内容替换内存快照（仅文件存储）
    fn reload(&self, records: &mut Vec<Allergen>) -> Result<(), StoreError> {
        if let Some(path) = &self.path {
            *records = load_file(path)?;
        }
        Ok(())
    }

    fn persist(&self, records: &[Allergen]) -> Result<(), StoreError> {
        let Some(path) = &self.path else { return Ok(()) };
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(records)?)?;
        fs::rename(&tmp, path)?;
        debug!(path = %path.display(), count = records.len(), "allergen store flushed");
        Ok(())
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Vec<Allergen>> {
        self.records.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Vec<Allergen>> {
        self.records.write().unwrap_or_else(|e| e.into_inner())
    }
}

fn load_file(path: &Path) -> Result<Vec<Allergen>, StoreError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let txt = fs::read_to_string(path)?;
    if txt.trim().is_empty() { Ok(Vec::new()) } else { Ok(serde_json::from_str::<Vec<Allergen>>(&txt)?) }
}

/// id 必须是合法 UUID（与生成规则一致）
pub fn parse_id(id: &str) -> Result<Uuid, StoreError> {
    Uuid::parse_str(id).map_err(|_| StoreError::InvalidId(id.to_string()))
}

impl AllergenStore for AllergenCatalog {
    fn find_by_ids(&self, ids: &[AllergenId]) -> Result<Vec<Allergen>, StoreError> {
        let records = self.read();
        Ok(records.iter().filter(|a| ids.iter().any(|id| *id == a.id)).cloned().collect())
    }

    fn list_all(&self) -> Result<Vec<Allergen>, StoreError> {
        Ok(self.read().clone())
    }

    fn create(&self, input: AllergenInput) -> Result<Allergen, StoreError> {
        input.validate()?;
        let mut records = self.write();
        self.reload(&mut records)?;
        if records.iter().any(|a| a.name == input.name) {
            return Err(StoreError::DuplicateName(input.name));
        }
        let allergen = Allergen::from_input(Uuid::new_v4().to_string(), input);
        records.push(allergen.clone());
        if let Err(e) = self.persist(&records) {
            records.pop();
            return Err(e);
        }
        info!(id = %allergen.id, name = %allergen.name, "allergen created");
        Ok(allergen)
    }

    fn update(&self, id: &str, input: AllergenInput) -> Result<Allergen, StoreError> {
        parse_id(id)?;
        input.validate()?;
        let mut records = self.write();
        self.reload(&mut records)?;
        let idx = records.iter().position(|a| a.id == id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if records.iter().any(|a| a.id != id && a.name == input.name) {
            return Err(StoreError::DuplicateName(input.name));
        }
        let updated = Allergen::from_input(id.to_string(), input);
        let previous = std::mem::replace(&mut records[idx], updated.clone());
        if let Err(e) = self.persist(&records) {
            records[idx] = previous;
            return Err(e);
        }
        info!(id, "allergen updated");
        Ok(updated)
    }

    fn delete(&self, id: &str) -> Result<(), StoreError> {
        parse_id(id)?;
        let mut records = self.write();
        self.reload(&mut records)?;
        let idx = records.iter().position(|a| a.id == id).ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        let removed = records.remove(idx);
        if let Err(e) = self.persist(&records) {
            records.insert(idx, removed);
            return Err(e);
        }
        info!(id, "allergen deleted");
        Ok(())
    }
}
