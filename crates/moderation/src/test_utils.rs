//! 测试工具模块
//!
//! 内容与举报存储的内存实现，记录每次存储调用以便断言

use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use petadmin_shared::error::Result;
use uuid::Uuid;

use crate::models::{
    AvisoStatus, ContentPatch, ContentType, DeletableContent, Report, ReportFilter, ReportReason,
    ReportStatus, ReviewUpdate,
};
use crate::store::{ContentStore, ReportStore};

/// 内存中的内容状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AvisoState {
    pub is_active: bool,
    pub status: AvisoStatus,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProfileState {
    pub is_active: bool,
    pub suspended: bool,
}

/// 一次内容存储调用
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentCall {
    Update(Uuid, ContentPatch),
    Delete(DeletableContent, Uuid),
}

#[derive(Default)]
pub struct InMemoryContentStore {
    avisos: DashMap<Uuid, AvisoState>,
    petomatch: DashMap<Uuid, bool>,
    profiles: DashMap<Uuid, ProfileState>,
    calls: Mutex<Vec<ContentCall>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_aviso(&self, id: Uuid) {
        self.avisos.insert(
            id,
            AvisoState {
                is_active: true,
                status: AvisoStatus::Active,
            },
        );
    }

    pub fn add_petomatch(&self, id: Uuid) {
        self.petomatch.insert(id, true);
    }

    pub fn add_profile(&self, id: Uuid) {
        self.profiles.insert(
            id,
            ProfileState {
                is_active: true,
                suspended: false,
            },
        );
    }

    pub fn aviso(&self, id: Uuid) -> Option<AvisoState> {
        self.avisos.get(&id).map(|a| *a)
    }

    pub fn petomatch_active(&self, id: Uuid) -> Option<bool> {
        self.petomatch.get(&id).map(|p| *p)
    }

    pub fn profile(&self, id: Uuid) -> Option<ProfileState> {
        self.profiles.get(&id).map(|p| *p)
    }

    pub fn calls(&self) -> Vec<ContentCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    fn record(&self, call: ContentCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn update_content(&self, id: Uuid, patch: &ContentPatch) -> Result<bool> {
        self.record(ContentCall::Update(id, *patch));

        let updated = match *patch {
            ContentPatch::Aviso { is_active, status } => self
                .avisos
                .get_mut(&id)
                .map(|mut a| *a = AvisoState { is_active, status })
                .is_some(),
            ContentPatch::Petomatch { is_active } => self
                .petomatch
                .get_mut(&id)
                .map(|mut p| *p = is_active)
                .is_some(),
            ContentPatch::Profile {
                is_active,
                suspended,
            } => self
                .profiles
                .get_mut(&id)
                .map(|mut p| {
                    *p = ProfileState {
                        is_active,
                        suspended,
                    }
                })
                .is_some(),
        };
        Ok(updated)
    }

    async fn delete_content(&self, target: DeletableContent, id: Uuid) -> Result<bool> {
        self.record(ContentCall::Delete(target, id));

        let removed = match target {
            DeletableContent::Aviso => self.avisos.remove(&id).is_some(),
            DeletableContent::Petomatch => self.petomatch.remove(&id).is_some(),
        };
        Ok(removed)
    }
}

#[derive(Default)]
pub struct InMemoryReportStore {
    reports: DashMap<Uuid, Report>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, report: Report) {
        self.reports.insert(report.id, report);
    }

    pub fn snapshot(&self, id: Uuid) -> Option<Report> {
        self.reports.get(&id).map(|r| r.clone())
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn list(&self, filter: &ReportFilter) -> Result<Vec<Report>> {
        let mut reports: Vec<Report> = self
            .reports
            .iter()
            .filter(|r| filter.matches(r))
            .map(|r| r.clone())
            .collect();
        reports.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(reports)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Report>> {
        Ok(self.snapshot(id))
    }

    async fn update_review(&self, id: Uuid, review: &ReviewUpdate) -> Result<Option<Report>> {
        Ok(self.reports.get_mut(&id).map(|mut report| {
            report.status = review.status;
            if let Some(notes) = &review.admin_notes {
                report.admin_notes = Some(notes.clone());
            }
            report.reviewed_by = review.reviewed_by;
            report.reviewed_at = Some(review.reviewed_at);
            report.clone()
        }))
    }
}

/// 构造一条待处理的举报
pub fn test_report(content_type: ContentType, content_id: Uuid) -> Report {
    Report {
        id: Uuid::new_v4(),
        reporter_id: Uuid::new_v4(),
        content_type,
        content_id,
        reason: ReportReason::Inappropriate,
        description: Some("内容包含不当信息".to_string()),
        status: ReportStatus::Pending,
        admin_notes: None,
        reviewed_by: None,
        reviewed_at: None,
        created_at: Utc::now(),
    }
}
