pub mod gallery_service;
