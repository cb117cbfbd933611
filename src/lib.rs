/*!
# Gate Pass Inventory

Backend for a small company's store gate: items leave through numbered gate
passes, returnable ones come back, and every pass is mirrored to a Google
Sheet that also holds the user accounts.

## Architecture

### Domain Layer
- **model**: items, requesters, gate passes, users, roles and views
- **store**: the single in-memory store and its mutators
- **gate_pass**: numbering, create/edit/return, status transitions, filtering
- **dashboard**: cards, recent activity and the monthly movement series

### Adapters
- **sheet**: typed client for the Apps Script endpoint (login, signup,
  pass rows) and the raw sheet row schema
- **outbox**: background push of new passes to the sheet with observable
  outcomes and manual retry
- **reminder**: overdue reminder and management summary text from Gemini
- **phone**: Bangladesh phone normalization and WhatsApp share links

### Data Persistence Layer
- Store snapshot with Gzip compression and bincode serialization
- `settings.json` with the sheet URL and an Argon2-hashed settings password
- CSV import, CSV/XLSX export

## Modules

- **login**: authentication, sessions and view permissions
- **settings**: endpoint URL behind the settings password
- **loader** / **downloader**: CSV import and CSV/XLSX export
- **saving**: snapshot persistence
- **config**: file and environment configuration
- **error**: the application error type
- **app**: routing and middleware (feature `web`)

## REST API Endpoints

- `/api/auth/login`, `/api/auth/signup`, `/api/auth/logout`, `/api/auth/me`
- `/api/gate-passes` and `/api/gate-passes/{id}/...` - pass lifecycle
- `/api/items`, `/api/requesters`, `/api/categories`, `/api/units` - master data
- `/api/sheet/rows`, `/api/sheet/export` - raw sheet rows
- `/api/sync` - sheet push outbox
- `/api/settings` - endpoint URL setup and change
*/

#[cfg(feature = "web")]
pub mod app;
pub mod config;
pub mod dashboard;
pub mod downloader;
pub mod error;
pub mod gate_pass;
pub mod loader;
pub mod login;
pub mod model;
pub mod outbox;
pub mod phone;
pub mod reminder;
pub mod saving;
pub mod seed;
pub mod settings;
pub mod sheet;
pub mod store;

pub use error::{AppError, AppResult};
pub use model::*;
pub use store::Store;
