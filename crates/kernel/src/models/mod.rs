//! Database models.
//!
//! Every tenant-owned model takes a [`TenantContext`](crate::tenant::TenantContext)
//! and scopes its queries by `tenant_id`.

pub mod faq;
pub mod listing;
pub mod media;
pub mod menu;
pub mod ordering;
pub mod page;
pub mod section;
pub mod service;
pub mod setting;
pub mod team_member;
pub mod template;
pub mod tenant;
pub mod testimonial;
pub mod user;
pub mod webhook;

pub use faq::{CreateFaq, Faq, UpdateFaq};
pub use listing::{ListFilters, PageRequest, Paginated};
pub use media::{Media, MediaFilters, NewMedia, UpdateMedia};
pub use menu::{CreateMenu, Menu, UpdateMenu};
pub use page::{CreatePage, Page, UpdatePage};
pub use section::{NewSection, Section, UpdateSection};
pub use service::{
    CreateService, CreateServiceCategory, DeleteOutcome, Service, ServiceCategory, ServiceFilters,
    UpdateService, UpdateServiceCategory,
};
pub use setting::{Setting, SettingInput};
pub use team_member::{CreateTeamMember, TeamMember, UpdateTeamMember};
pub use template::{CreateTemplate, SectionBlueprint, Template, UpdateTemplate};
pub use tenant::{ContentCounts, CreateTenant, Tenant, UpdateTenant};
pub use testimonial::{CreateTestimonial, Testimonial, UpdateTestimonial};
pub use user::{CreateUser, Role, UpdateUser, User};
pub use webhook::{CreateWebhook, UpdateWebhook, Webhook};
