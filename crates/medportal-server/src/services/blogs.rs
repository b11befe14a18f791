use medportal_api::ApiError;
use medportal_auth::{Action, Identity, ResourceKind};
use medportal_core::Blog;
use medportal_storage::{Collection, DynStore, Filter, Stored};
use serde_json::Value;

use super::{checked_id, ensure_access, gate};
use crate::form::{RequestForm, UploadedFile};
use crate::uploads::{DynFileStore, PUBLIC_PREFIX, is_image_mime, is_video_mime, remove_quietly};
use crate::validation::{Issues, char_len_between};

const NOT_FOUND: &str = "Blog not found";

/// Client-supplied blog fields. Anything else in the body is ignored.
#[derive(Debug, Clone, PartialEq)]
pub struct BlogInput {
    pub title: String,
    pub content: String,
    /// `None` keeps the current media on update.
    pub images: Option<Vec<String>>,
    pub videos: Option<Vec<String>>,
}

impl BlogInput {
    fn parse(form: &RequestForm, issues: &mut Issues) -> Option<Self> {
        let title = form.text("title").filter(|t| char_len_between(t, 3, 100));
        if title.is_none() {
            issues.push("title", "Title must be between 3 and 100 characters");
        }
        let content = form.text("content").filter(|c| char_len_between(c, 5, 5000));
        if content.is_none() {
            issues.push("content", "Content must be between 5 and 5000 characters");
        }
        let images = media_list(form, "images", issues);
        let videos = media_list(form, "videos", issues);
        Some(Self {
            title: title?.to_string(),
            content: content?.to_string(),
            images,
            videos,
        })
    }
}

fn media_list(form: &RequestForm, field: &str, issues: &mut Issues) -> Option<Vec<String>> {
    match form.value(field)? {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) if items.iter().all(Value::is_string) => Some(
            items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
        ),
        _ => {
            issues.push(field, format!("{field} must be a list of strings"));
            None
        }
    }
}

#[derive(Clone)]
pub struct BlogService {
    blogs: Collection<Blog>,
    files: DynFileStore,
    max_file_bytes: usize,
}

impl BlogService {
    pub fn new(store: DynStore, files: DynFileStore, max_file_bytes: usize) -> Self {
        Self {
            blogs: Collection::new(store),
            files,
            max_file_bytes,
        }
    }

    fn parse<'f>(
        &self,
        form: &'f RequestForm,
    ) -> Result<(BlogInput, Vec<&'f UploadedFile>, Vec<&'f UploadedFile>), ApiError> {
        let mut issues = Issues::new();
        let input = BlogInput::parse(form, &mut issues);
        let images: Vec<_> = form.files_for("images").collect();
        let videos: Vec<_> = form.files_for("videos").collect();
        if images.iter().any(|f| !is_image_mime(&f.content_type)) {
            return Err(ApiError::bad_request("Only image files are allowed for images"));
        }
        if videos.iter().any(|f| !is_video_mime(&f.content_type)) {
            return Err(ApiError::bad_request("Only video files are allowed for videos"));
        }
        for file in images.iter().chain(videos.iter()) {
            if file.size() > self.max_file_bytes {
                issues.push(&file.field, format!("File exceeds {} bytes", self.max_file_bytes));
            }
        }
        issues.finish()?;
        let input = input.ok_or_else(|| ApiError::internal("validated blog fields missing"))?;
        Ok((input, images, videos))
    }

    /// Stores the files, removing the ones already written if one fails.
    async fn save_files(&self, files: &[&UploadedFile]) -> Result<Vec<String>, ApiError> {
        let mut paths = Vec::with_capacity(files.len());
        for file in files {
            match self.files.save(file).await {
                Ok(file_ref) => paths.push(file_ref.path),
                Err(e) => {
                    self.remove_media(&paths).await;
                    return Err(e.into());
                }
            }
        }
        Ok(paths)
    }

    async fn remove_media(&self, paths: &[String]) {
        for path in paths.iter().filter(|p| is_stored_upload(p)) {
            remove_quietly(self.files.as_ref(), path).await;
        }
    }

    /// Uploaded files win over media lists sent as fields. A listed path
    /// into the upload store is kept only when `owned` already holds it, so a
    /// blog never adopts (and later deletes) another blog's files.
    async fn resolve_media(
        &self,
        listed: Option<Vec<String>>,
        owned: &[String],
        uploaded: &[&UploadedFile],
    ) -> Result<Option<Vec<String>>, ApiError> {
        if !uploaded.is_empty() {
            return Ok(Some(self.save_files(uploaded).await?));
        }
        Ok(listed.map(|paths| {
            paths
                .into_iter()
                .filter(|path| {
                    let foreign = is_stored_upload(path) && !owned.contains(path);
                    if foreign {
                        tracing::warn!(path = %path, "ignoring media path not owned by this blog");
                    }
                    !foreign
                })
                .collect()
        }))
    }

    pub async fn create(&self, caller: &Identity, form: &RequestForm) -> Result<Stored<Blog>, ApiError> {
        gate(ResourceKind::Blog, Action::Create, caller)?;
        let (input, images, videos) = self.parse(form)?;

        let images = self
            .resolve_media(input.images, &[], &images)
            .await?
            .unwrap_or_default();
        let videos = match self.resolve_media(input.videos, &[], &videos).await {
            Ok(v) => v.unwrap_or_default(),
            Err(e) => {
                self.remove_media(&images).await;
                return Err(e);
            }
        };
        let blog = Blog {
            title: input.title,
            content: input.content,
            identity_id: caller.id.clone(),
            images,
            videos,
        };
        let media: Vec<String> = blog.images.iter().chain(&blog.videos).cloned().collect();
        match self.blogs.insert(blog).await {
            Ok(stored) => Ok(stored),
            Err(e) => {
                self.remove_media(&media).await;
                Err(e.into())
            }
        }
    }

    /// Every blog; none is an empty list.
    pub async fn list_all(&self) -> Result<Vec<Stored<Blog>>, ApiError> {
        Ok(self.blogs.find(&Filter::all()).await?)
    }

    pub async fn get(&self, id: &str) -> Result<Stored<Blog>, ApiError> {
        let id = checked_id(id, NOT_FOUND)?;
        self.blogs
            .get(id)
            .await?
            .ok_or_else(|| ApiError::not_found(NOT_FOUND))
    }

    pub async fn list_own(&self, caller: &Identity) -> Result<Vec<Stored<Blog>>, ApiError> {
        gate(ResourceKind::Blog, Action::ListOwn, caller)?;
        Ok(self.blogs.find_owned_by(&caller.id).await?)
    }

    pub async fn count_own(&self, caller: &Identity) -> Result<u64, ApiError> {
        gate(ResourceKind::Blog, Action::Count, caller)?;
        Ok(self.blogs.count(&Collection::<Blog>::owner_filter(&caller.id)?).await?)
    }

    async fn load_owned(&self, caller: &Identity, id: &str, action: Action) -> Result<Stored<Blog>, ApiError> {
        let blog = self.get(id).await?;
        ensure_access(ResourceKind::Blog, action, caller, &blog.data.identity_id)?;
        Ok(blog)
    }

    pub async fn update(&self, caller: &Identity, id: &str, form: &RequestForm) -> Result<Stored<Blog>, ApiError> {
        gate(ResourceKind::Blog, Action::Update, caller)?;
        let (input, images, videos) = self.parse(form)?;
        let mut blog = self.load_owned(caller, id, Action::Update).await?;

        let previous: Vec<String> = blog.data.images.iter().chain(&blog.data.videos).cloned().collect();
        let new_images = self.resolve_media(input.images, &previous, &images).await?;
        let new_videos = match self.resolve_media(input.videos, &previous, &videos).await {
            Ok(v) => v,
            Err(e) => {
                self.remove_media(new_images.as_deref().unwrap_or_default()).await;
                return Err(e);
            }
        };

        blog.data.title = input.title;
        blog.data.content = input.content;
        if let Some(images) = new_images {
            blog.data.images = images;
        }
        if let Some(videos) = new_videos {
            blog.data.videos = videos;
        }

        let saved = self.blogs.save(&blog).await?;
        let dropped: Vec<String> = previous
            .into_iter()
            .filter(|p| !saved.data.images.contains(p) && !saved.data.videos.contains(p))
            .collect();
        self.remove_media(&dropped).await;
        Ok(saved)
    }

    pub async fn delete(&self, caller: &Identity, id: &str) -> Result<(), ApiError> {
        gate(ResourceKind::Blog, Action::Delete, caller)?;
        let blog = self.load_owned(caller, id, Action::Delete).await?;
        if !self.blogs.delete(&blog.id).await? {
            return Err(ApiError::not_found(NOT_FOUND));
        }
        let media: Vec<String> = blog.data.images.into_iter().chain(blog.data.videos).collect();
        self.remove_media(&media).await;
        Ok(())
    }
}

fn is_stored_upload(path: &str) -> bool {
    path.strip_prefix(PUBLIC_PREFIX)
        .is_some_and(|rest| rest.starts_with('/'))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uploads::LocalFileStore;
    use axum::body::Bytes;
    use medportal_core::Role;
    use serde_json::json;
    use std::sync::Arc;

    fn service(dir: &tempfile::TempDir) -> BlogService {
        let files: DynFileStore = Arc::new(LocalFileStore::new(dir.path()));
        BlogService::new(medportal_db_memory::create_store(), files, 1024)
    }

    fn form(v: Value) -> RequestForm {
        RequestForm::from_json(v).unwrap()
    }

    fn media(field: &str, mime: &str) -> UploadedFile {
        UploadedFile {
            field: field.into(),
            file_name: "clip.bin".into(),
            content_type: mime.into(),
            bytes: Bytes::from_static(b"data"),
        }
    }

    #[tokio::test]
    async fn owner_lifecycle_and_public_reads() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        let author = Identity::new("u1", Some(Role::Doctor));
        let other = Identity::new("u2", Some(Role::Patient));

        assert!(svc.list_all().await.unwrap().is_empty());
        let blog = svc
            .create(&author, &form(json!({"title": "Hello", "content": "World!", "clerkUserId": "spoofed"})))
            .await
            .unwrap();
        assert_eq!(blog.data.identity_id, "u1");
        assert_eq!(svc.get(&blog.id).await.unwrap().data.title, "Hello");
        assert_eq!(svc.count_own(&author).await.unwrap(), 1);
        assert_eq!(svc.count_own(&other).await.unwrap(), 0);
        assert!(svc.list_own(&other).await.unwrap().is_empty());

        let edit = form(json!({"title": "Hello again", "content": "Still here"}));
        let err = svc.update(&other, &blog.id, &edit).await.unwrap_err();
        assert_eq!(err.to_body()["message"], "Forbidden: You cannot modify this blog");
        let updated = svc.update(&author, &blog.id, &edit).await.unwrap();
        assert_eq!(updated.data.title, "Hello again");

        assert!(matches!(svc.delete(&other, &blog.id).await, Err(ApiError::Forbidden(_))));
        svc.delete(&author, &blog.id).await.unwrap();
        assert!(matches!(svc.get(&blog.id).await, Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn validates_lengths() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        let author = Identity::new("u1", None);
        let err = svc
            .create(&author, &form(json!({"title": "Hi", "content": "abc"})))
            .await
            .unwrap_err();
        assert_eq!(err.to_body()["errors"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn listed_paths_cannot_claim_another_blogs_files() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        let victim = Identity::new("u1", None);
        let attacker = Identity::new("u2", None);

        let mut upload = form(json!({"title": "Mine", "content": "My photo"}));
        upload.files.push(media("images", "image/png"));
        let owned = svc.create(&victim, &upload).await.unwrap();
        let path = owned.data.images[0].clone();
        let on_disk = dir.path().join(path.trim_start_matches("uploads/"));
        assert!(on_disk.exists());

        let claim = form(json!({
            "title": "Theirs",
            "content": "Not my photo",
            "images": [path.clone(), "https://cdn.example.com/a.png"]
        }));
        let created = svc.create(&attacker, &claim).await.unwrap();
        assert_eq!(created.data.images, vec!["https://cdn.example.com/a.png".to_string()]);

        let plain = svc
            .create(&attacker, &form(json!({"title": "Other", "content": "No media"})))
            .await
            .unwrap();
        let updated = svc.update(&attacker, &plain.id, &claim).await.unwrap();
        assert!(!updated.data.images.contains(&path));

        svc.delete(&attacker, &created.id).await.unwrap();
        svc.delete(&attacker, &plain.id).await.unwrap();
        assert!(on_disk.exists());
        assert_eq!(svc.get(&owned.id).await.unwrap().data.images, vec![path]);
    }

    #[tokio::test]
    async fn update_may_keep_its_own_listed_files() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        let author = Identity::new("u1", None);
        let mut upload = form(json!({"title": "Trip", "content": "Photos below"}));
        upload.files.push(media("images", "image/png"));
        upload.files.push(media("images", "image/png"));
        let blog = svc.create(&author, &upload).await.unwrap();
        let (keep, drop) = (blog.data.images[0].clone(), blog.data.images[1].clone());

        let edit = form(json!({"title": "Trip", "content": "One photo", "images": [keep.clone()]}));
        let updated = svc.update(&author, &blog.id, &edit).await.unwrap();
        assert_eq!(updated.data.images, vec![keep.clone()]);
        assert!(dir.path().join(keep.trim_start_matches("uploads/")).exists());
        assert!(!dir.path().join(drop.trim_start_matches("uploads/")).exists());
    }

    #[tokio::test]
    async fn media_uploads_are_type_checked_and_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(&dir);
        let author = Identity::new("u1", None);

        let mut bad = form(json!({"title": "Trip", "content": "Photos below"}));
        bad.files.push(media("images", "video/mp4"));
        assert!(matches!(svc.create(&author, &bad).await, Err(ApiError::BadRequest(_))));

        let mut good = form(json!({"title": "Trip", "content": "Photos below"}));
        good.files.push(media("images", "image/png"));
        good.files.push(media("videos", "video/mp4"));
        let blog = svc.create(&author, &good).await.unwrap();
        assert_eq!(blog.data.images.len(), 1);
        assert_eq!(blog.data.videos.len(), 1);

        let mut replace = form(json!({"title": "Trip", "content": "New photos"}));
        replace.files.push(media("images", "image/jpeg"));
        let updated = svc.update(&author, &blog.id, &replace).await.unwrap();
        assert_ne!(updated.data.images, blog.data.images);
        assert_eq!(updated.data.videos, blog.data.videos);
        let old_name = blog.data.images[0].trim_start_matches("uploads/");
        assert!(!dir.path().join(old_name).exists());
    }
}
