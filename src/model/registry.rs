//! Named model table.
//!
//! * Slots are looked up by exact name and never move, so a
//!   [`ModelHandle`] stays valid for the registry's lifetime.
//! * A slot's index doubles as its [`CacheUser`], which is how evicted alias
//!   payloads are found again.
//! * Single-threaded: the registry owns the hunk, the cache and the scratch
//!   window and hands them to one load at a time.

use thiserror::Error;

use crate::{
    config::EngineConfig,
    format::ModelFormat,
    io::{DirSource, FileSource, ReadError, ScratchBuffer},
    memory::{Cache, CacheUser, Hunk},
    model::{
        AliasModel, LoadError, Model, ModelType,
        alias::load_alias_model,
        brush::load_brush_model,
        context::LoaderContext,
        sprite::load_sprite_model,
    },
};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("empty model name")]
    EmptyName,

    #[error("model table full ({0} slots)")]
    Full(usize),

    #[error("{0}: caching failed")]
    CachingFailed(String),

    #[error("{0} is not an alias model")]
    NotAlias(String),

    #[error("bad model handle {0}")]
    BadHandle(usize),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ModelHandle(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SlotState {
    Present,
    NeedsLoad,
    /// Left over from a previous level; reclaimable when the table fills.
    Unreferenced,
}

#[derive(Debug)]
struct Slot {
    name: String,
    state: SlotState,
    kind: Option<ModelType>,
    model: Option<Model>,
}

impl Slot {
    fn reserved(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            state: SlotState::NeedsLoad,
            kind: None,
            model: None,
        }
    }
}

pub struct ModelRegistry {
    slots: Vec<Slot>,
    capacity: usize,
    source: Box<dyn FileSource>,
    scratch: ScratchBuffer,
    hunk: Hunk,
    cache: Cache,
    texture_limit: Option<usize>,
}

impl ModelRegistry {
    pub fn new(cfg: &EngineConfig, source: Box<dyn FileSource>) -> Self {
        log::info!(
            "registry: {} slots, hunk {} KiB, cache {} KiB",
            cfg.max_models,
            cfg.hunk_size / 1024,
            cfg.cache_size / 1024
        );
        Self {
            slots: Vec::with_capacity(cfg.max_models),
            capacity: cfg.max_models,
            source,
            scratch: ScratchBuffer::with_capacity(cfg.scratch_size),
            hunk: Hunk::new(cfg.hunk_size),
            cache: Cache::new(cfg.cache_size),
            texture_limit: cfg.texture_limit,
        }
    }

    /// Registry reading from `cfg.base_dir`.
    pub fn from_config(cfg: &EngineConfig) -> Self {
        Self::new(cfg, Box::new(DirSource::new(cfg.base_dir.clone())))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn hunk(&self) -> &Hunk {
        &self.hunk
    }

    /// Level code rewinds the hunk between maps.
    pub fn hunk_mut(&mut self) -> &mut Hunk {
        &mut self.hunk
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut Cache {
        &mut self.cache
    }

    // ------------------------------------------------------------------ //
    // Lookup
    // ------------------------------------------------------------------ //

    /// Slot for `name`, reserving one if it is not known yet.
    pub fn find_or_reserve(&mut self, name: &str) -> Result<ModelHandle, RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let mut avail = None;
        for (i, slot) in self.slots.iter().enumerate() {
            if slot.name == name {
                return Ok(ModelHandle(i));
            }
            // any unreferenced slot, but prefer ones without a cache entry
            if slot.state == SlotState::Unreferenced
                && (avail.is_none() || slot.kind != Some(ModelType::Alias))
            {
                avail = Some(i);
            }
        }

        if self.slots.len() < self.capacity {
            self.slots.push(Slot::reserved(name));
            return Ok(ModelHandle(self.slots.len() - 1));
        }

        let i = avail.ok_or(RegistryError::Full(self.capacity))?;
        if self.slots[i].kind == Some(ModelType::Alias) {
            self.cache.free(CacheUser(i as u32));
        }
        log::debug!("registry: slot {i} {} reused for {name}", self.slots[i].name);
        self.slots[i] = Slot::reserved(name);
        Ok(ModelHandle(i))
    }

    pub fn handle(&self, name: &str) -> Option<ModelHandle> {
        self.slots.iter().position(|s| s.name == name).map(ModelHandle)
    }

    /// Keep a model's payload warm; an evicted alias slot is marked for
    /// reload.
    pub fn touch(&mut self, name: &str) -> Result<ModelHandle, RegistryError> {
        let h = self.find_or_reserve(name)?;
        let slot = &mut self.slots[h.0];
        if slot.state == SlotState::Present
            && slot.kind == Some(ModelType::Alias)
            && self.cache.check(CacheUser(h.0 as u32)).is_none()
        {
            slot.state = SlotState::NeedsLoad;
        }
        Ok(h)
    }

    /// Mark everything reclaimable.  Brush data stays until the slot is
    /// reused or reloaded; sprite payloads are dropped.
    pub fn clear_all(&mut self) {
        for slot in &mut self.slots {
            slot.state = SlotState::Unreferenced;
            if slot.kind == Some(ModelType::Sprite) {
                slot.model = None;
            }
        }
    }

    pub fn model(&self, h: ModelHandle) -> Option<&Model> {
        self.slots.get(h.0)?.model.as_ref()
    }

    pub fn state(&self, h: ModelHandle) -> Option<SlotState> {
        self.slots.get(h.0).map(|s| s.state)
    }

    pub fn name(&self, h: ModelHandle) -> Option<&str> {
        self.slots.get(h.0).map(|s| s.name.as_str())
    }

    // ------------------------------------------------------------------ //
    // Loading
    // ------------------------------------------------------------------ //

    /// Look up and load in one step.  A missing file is `Ok(None)` unless
    /// `crash` is set.
    pub fn for_name(&mut self, name: &str, crash: bool) -> Result<Option<ModelHandle>, LoadError> {
        let h = self.find_or_reserve(name)?;
        Ok(self.load_model(h, crash)?.map(|_| h))
    }

    /// Make sure the model in slot `h` is resident.
    pub fn load_model(&mut self, h: ModelHandle, crash: bool) -> Result<Option<&Model>, LoadError> {
        let idx = h.0;
        let Some(slot) = self.slots.get(idx) else {
            return Err(RegistryError::BadHandle(idx).into());
        };

        let resident = match slot.kind {
            Some(ModelType::Alias) => {
                slot.model.is_some() && self.cache.contains(CacheUser(idx as u32))
            }
            _ => slot.state == SlotState::Present && slot.model.is_some(),
        };
        if resident {
            // refresh recency
            self.cache.check(CacheUser(idx as u32));
            self.slots[idx].state = SlotState::Present;
            return Ok(self.slots[idx].model.as_ref());
        }

        let mark = self.hunk.low_mark();
        match self.load_fresh(idx) {
            Ok(models) => {
                if let Err(e) = self.install(idx, models) {
                    self.hunk.free_to_low_mark(mark);
                    return Err(e);
                }
            }
            Err(LoadError::Read(ReadError::FileNotFound(path))) if !crash => {
                log::warn!("registry: {path} not found");
                return Ok(None);
            }
            Err(e) => {
                self.hunk.free_to_low_mark(mark);
                let slot = &mut self.slots[idx];
                slot.state = SlotState::Unreferenced;
                slot.kind = None;
                slot.model = None;
                log::warn!("registry: {} failed to load: {e}", slot.name);
                return Err(e);
            }
        }
        Ok(self.slots[idx].model.as_ref())
    }

    /// Read the file behind slot `idx` and build its model(s).  Brush
    /// files yield the world followed by its `*N` submodels.
    fn load_fresh(&mut self, idx: usize) -> Result<Vec<Model>, LoadError> {
        let name = self.slots[idx].name.clone();
        let user = CacheUser(idx as u32);
        let mut ctx = LoaderContext::new(
            &*self.source,
            &name,
            &mut self.scratch,
            &mut self.hunk,
            self.texture_limit,
        )?;

        let probe = ctx.file_len.min(4) as usize;
        let mut magic = [0u8; 4];
        magic[..probe].copy_from_slice(ctx.window(0, probe)?);

        let models = match ModelFormat::detect(magic) {
            ModelFormat::Alias => {
                // stale entry from before an eviction-triggered reload
                self.cache.free(user);
                vec![load_alias_model(&mut ctx, &mut self.cache, user)?]
            }
            ModelFormat::Sprite => vec![load_sprite_model(&mut ctx)?],
            ModelFormat::Brush => load_brush_model(&mut ctx)?,
        };
        log::info!(
            "registry: loaded {name} ({:?}, hunk {} / {})",
            models[0].model_type(),
            self.hunk.used(),
            self.hunk.capacity()
        );
        Ok(models)
    }

    /// Store freshly loaded models; submodels go to their own `*N` slots.
    fn install(&mut self, idx: usize, mut models: Vec<Model>) -> Result<(), LoadError> {
        let subs = models.split_off(1);
        let mut placed: Vec<usize> = Vec::with_capacity(subs.len());

        for sub in subs {
            match self.find_or_reserve(&sub.name) {
                Ok(h) => {
                    let slot = &mut self.slots[h.0];
                    slot.state = SlotState::Present;
                    slot.kind = Some(ModelType::Brush);
                    slot.model = Some(sub);
                    placed.push(h.0);
                }
                Err(e) => {
                    for i in placed.into_iter().chain([idx]) {
                        let slot = &mut self.slots[i];
                        slot.state = SlotState::Unreferenced;
                        slot.kind = None;
                        slot.model = None;
                    }
                    log::warn!("registry: no room for {}: {e}", sub.name);
                    return Err(e.into());
                }
            }
        }

        let world = models.pop();
        let slot = &mut self.slots[idx];
        slot.kind = world.as_ref().map(Model::model_type);
        slot.model = world;
        slot.state = SlotState::Present;
        Ok(())
    }

    /// Decoded alias payload of `h`, reloading it if the cache dropped it.
    pub fn extradata(&mut self, h: ModelHandle) -> Result<AliasModel, LoadError> {
        let user = CacheUser(h.0 as u32);
        if let Some(bytes) = self.cache.check(user) {
            return Ok(AliasModel::from_cache_bytes(bytes)?);
        }
        self.load_model(h, true)?;

        let slot = self.slots.get(h.0).ok_or(RegistryError::BadHandle(h.0))?;
        if slot.kind != Some(ModelType::Alias) {
            return Err(RegistryError::NotAlias(slot.name.clone()).into());
        }
        let name = slot.name.clone();
        match self.cache.check(user) {
            Some(bytes) => Ok(AliasModel::from_cache_bytes(bytes)?),
            None => Err(RegistryError::CachingFailed(name).into()),
        }
    }

    /// Log every slot, then the allocators.
    pub fn report(&self) {
        log::info!("registry: {} / {} slots", self.slots.len(), self.capacity);
        for (i, slot) in self.slots.iter().enumerate() {
            let flag = match slot.state {
                SlotState::Present => "",
                SlotState::NeedsLoad => " (!P)",
                SlotState::Unreferenced => " (!R)",
            };
            let kind = slot
                .kind
                .map(|k| format!("{k:?}"))
                .unwrap_or_else(|| "-".to_owned());
            log::info!("{i:4} {kind:>6} : {}{flag}", slot.name);
        }
        self.hunk.report();
        self.cache.report();
    }
}

/*====================================================================*/
/*                               Tests                                */
/*====================================================================*/
