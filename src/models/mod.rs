pub mod activity;
pub mod commit;
pub mod quality;
pub mod report;


pub use activity::{ActivityBucket, ActivityReport, ActivityStats, BucketKey, BucketMap, Granularity, Streak};
pub use commit::{CommitRecord, RepositoryDescriptor, RepositorySummary, UserProfile};
pub use quality::{EnhancementStatus, QualityCategory, QualityVerdict};
pub use report::{QualitySummary, Report, RepositoryOutcome, RunEvent, RunState};
