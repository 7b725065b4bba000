/*!
# xlsx-vault

A small web application for keeping Excel workbooks in a database, built in Rust.

## Overview

Users upload `.xlsx` files through the browser. Each upload is stored as a
single record (filename, raw bytes, upload time) and decoded into rows keyed by
the header row of its first sheet. Stored files can be listed, viewed and
edited in a grid, filtered, exported and downloaded again.

## Architecture

### Frontend Layer
- **Technologies**: HTML, CSS, JavaScript served by the backend
- **Pages**:
  - Upload page - file picker posting to `/upload`
  - Browse page - list of stored files with download and delete actions
  - Sheet page - editable grid with a filter box, save and export

### Backend Layer
- **Technologies**: Rust, axum, tokio
- **Core Components**:
  - Loader - decodes workbook bytes into rows (calamine)
  - Downloader - encodes rows back into a workbook (rust_xlsxwriter)
  - Grid - placeholder, filter and export naming rules
  - Store - the `files` table behind a SQLite pool (sqlx)

### Data Persistence Layer
- One `files` table: id, filename, file_data, upload_date
- Content is replaced wholesale on save; concurrent saves are last-write-wins

## Modules

- **app**: Routing, handlers and pages
- **config**: Command-line and environment configuration
- **downloader**: Row set to XLSX export
- **error**: Codec and HTTP error types
- **grid**: Presentation rules shared with the browser
- **loader**: XLSX to row set import
- **store**: Database access

## REST API Endpoints

- `POST /upload` - Stores a workbook and returns its rows
- `GET /files` - Lists stored files, newest first
- `GET /files/{id}` - Returns the filename and decoded rows
- `PUT /files/{id}` - Replaces the stored content with the given rows
- `GET /download/{id}` - Downloads the stored workbook
- `DELETE /delete/{id}` - Removes a stored file
- `POST /export` - Downloads a filtered row set as a new workbook
*/

pub mod app;
pub mod config;
pub mod downloader;
pub mod error;
pub mod grid;
pub mod loader;
pub mod store;

pub use config::Config;
pub use error::{AppError, SheetError};
pub use grid::GridLayout;
pub use loader::Row;
pub use store::{FileRecord, FileStore, FileSummary};
