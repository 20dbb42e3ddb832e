/*!
# Plotdash

An authenticated data-upload-and-visualization web service, built in Rust.

## Overview

Users register and log in, upload spreadsheet files (xlsx/csv) together with
plotting options, and receive generated plots back: structured chart series
for client-side rendering, or server-rendered PNG images. Generated plots can
optionally be persisted per user and managed (listed, fetched, renamed,
deleted) afterwards.

## Architecture

The application follows a client-server architecture:

### Backend Layer
- **Technologies**: Rust, axum
- **Core Components**:
  - File Store - Per-user namespaced directories for uploads and saved plots
  - Spreadsheet Parser - Converts uploaded xlsx/csv bytes into row datasets
  - Plot Spec Validator - Checks plotting options against the parsed schema
  - Plot Generator - Builds one chart series per non-Y column
  - Chart Renderer - Optional server-side PNG rendering via plotters
  - Artifact Lifecycle - Streams plots back inline or moves them into the
    user's saved namespace

### Data Persistence Layer
- JSON user registry with atomic rewrites
- Raw uploads at the user's namespace root, generated plots under `saved/`

## Request pipeline

`POST /upload/:username` runs receive -> parse -> validate -> persist raw
upload -> generate -> (render) -> finalize -> respond. Validation and parse
failures are reported before anything durable is written.

## Modules

- **loader**: Spreadsheet parsing (csv/xlsx) into datasets
- **plot**: Plot specifications, validation and series generation
- **render**: Chart rendering trait and the plotters PNG backend
- **artifacts**: Transient-vs-persisted artifact lifecycle
- **store**: Per-user file storage
- **login**: User registry, authentication and session tokens
- **error**: Error taxonomy shared by the whole pipeline
- **app**: Routing and request orchestration

## REST API Endpoints

- `POST /auth/register` - Create an account, returns a session token
- `POST /auth/login` - Authenticate, returns a token and the user profile
- `POST /upload/{username}` - Upload a spreadsheet and generate plots
- `GET /fetch/{username}` - List saved plots
- `GET /fetch/{username}/file/{filename}` - Read one saved plot
- `PUT /fetch/{username}/edit` - Rename a saved plot
- `DELETE /fetch/{username}/delete` - Delete a saved plot
*/

pub mod app;
pub mod artifacts;
pub mod error;
pub mod loader;
pub mod login;
pub mod plot;
pub mod render;
pub mod store;

pub use error::AppError;
pub use loader::{CellValue, Dataset};
pub use plot::{GraphType, PlotRequest, PlotSpec, PlotType, SeriesArtifact};
pub use store::FileStore;
