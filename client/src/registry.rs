//! # Class registry
//!
//! Applications refine the four entity kinds by registering classes. A class
//! declares the type key it stands for and, optionally, the registered class it
//! refines. When the server announces an entity, the registry resolves its
//! composite type key to the most-derived registered class; unknown keys fall
//! back to the base class of the kind.
//!
//! | Kind      | Type key                                              |
//! |-----------|-------------------------------------------------------|
//! | Node      | `custom_type`                                         |
//! | TagGroup  | `(node_custom_type, custom_type)`                     |
//! | Tag       | `(node_custom_type, tag_group_custom_type, custom_type)` |
//! | Layer     | `(node_custom_type, custom_type)`                     |

use std::{collections::HashMap, fmt::Debug, hash::Hash, sync::Arc};

use scenesync_shared::{CustomType, EntityKind, RegistryError};

use crate::{
    error::SessionError,
    session::Session,
    world::keys::{LayerKey, NodeKey, TagGroupKey, TagKey},
};

pub trait NodeClass: Send + Sync + 'static {
    fn name(&self) -> &'static str;

    /// Required for every registered class.
    fn custom_type(&self) -> Option<CustomType>;

    /// Name of the registered class this one refines.
    fn extends(&self) -> Option<&'static str> {
        None
    }

    fn auto_subscribe(&self) -> bool {
        true
    }

    /// Runs once the node is constructed, locally or from a server
    /// announcement. May create child entities.
    fn on_construct(&self, _session: &mut Session, _node: NodeKey) -> Result<(), SessionError> {
        Ok(())
    }

    /// Runs after every create confirmation handled for a node of this class.
    fn on_create(&self, _session: &mut Session, _node: NodeKey) {}
}

pub trait TagGroupClass: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    fn custom_type(&self) -> Option<CustomType>;
    fn node_custom_type(&self) -> Option<CustomType>;

    fn extends(&self) -> Option<&'static str> {
        None
    }

    fn auto_subscribe(&self) -> bool {
        true
    }

    fn on_construct(
        &self,
        _session: &mut Session,
        _tag_group: TagGroupKey,
    ) -> Result<(), SessionError> {
        Ok(())
    }

    fn on_create(&self, _session: &mut Session, _tag_group: TagGroupKey) {}
}

pub trait TagClass: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    fn custom_type(&self) -> Option<CustomType>;
    fn tag_group_custom_type(&self) -> Option<CustomType>;
    fn node_custom_type(&self) -> Option<CustomType>;

    fn extends(&self) -> Option<&'static str> {
        None
    }

    /// Tags ride on their tag group's subscription.
    fn auto_subscribe(&self) -> bool {
        false
    }

    fn on_construct(&self, _session: &mut Session, _tag: TagKey) -> Result<(), SessionError> {
        Ok(())
    }

    fn on_create(&self, _session: &mut Session, _tag: TagKey) {}
}

pub trait LayerClass: Send + Sync + 'static {
    fn name(&self) -> &'static str;
    fn custom_type(&self) -> Option<CustomType>;
    fn node_custom_type(&self) -> Option<CustomType>;

    fn extends(&self) -> Option<&'static str> {
        None
    }

    fn auto_subscribe(&self) -> bool {
        true
    }

    fn on_construct(&self, _session: &mut Session, _layer: LayerKey) -> Result<(), SessionError> {
        Ok(())
    }

    fn on_create(&self, _session: &mut Session, _layer: LayerKey) {}
}

// Base classes

/// Fallback for nodes whose type key matches no registered class.
pub struct BaseNode;

impl NodeClass for BaseNode {
    fn name(&self) -> &'static str {
        "Node"
    }

    fn custom_type(&self) -> Option<CustomType> {
        None
    }
}

pub struct BaseTagGroup;

impl TagGroupClass for BaseTagGroup {
    fn name(&self) -> &'static str {
        "TagGroup"
    }

    fn custom_type(&self) -> Option<CustomType> {
        None
    }

    fn node_custom_type(&self) -> Option<CustomType> {
        None
    }
}

pub struct BaseTag;

impl TagClass for BaseTag {
    fn name(&self) -> &'static str {
        "Tag"
    }

    fn custom_type(&self) -> Option<CustomType> {
        None
    }

    fn tag_group_custom_type(&self) -> Option<CustomType> {
        None
    }

    fn node_custom_type(&self) -> Option<CustomType> {
        None
    }
}

pub struct BaseLayer;

impl LayerClass for BaseLayer {
    fn name(&self) -> &'static str {
        "Layer"
    }

    fn custom_type(&self) -> Option<CustomType> {
        None
    }

    fn node_custom_type(&self) -> Option<CustomType> {
        None
    }
}

// ClassInfo

/// What the registry needs to know about a class of any kind.
pub(crate) trait ClassInfo {
    type Key: Copy + Eq + Hash + Debug;
    const KIND: EntityKind;

    fn class_name(&self) -> &'static str;
    fn base_name(&self) -> Option<&'static str>;
    /// The composite type key, or the name of the first missing attribute.
    fn type_key(&self) -> Result<Self::Key, &'static str>;
}

impl ClassInfo for dyn NodeClass {
    type Key = CustomType;
    const KIND: EntityKind = EntityKind::Node;

    fn class_name(&self) -> &'static str {
        self.name()
    }

    fn base_name(&self) -> Option<&'static str> {
        self.extends()
    }

    fn type_key(&self) -> Result<Self::Key, &'static str> {
        self.custom_type().ok_or("custom_type")
    }
}

impl ClassInfo for dyn TagGroupClass {
    type Key = (CustomType, CustomType);
    const KIND: EntityKind = EntityKind::TagGroup;

    fn class_name(&self) -> &'static str {
        self.name()
    }

    fn base_name(&self) -> Option<&'static str> {
        self.extends()
    }

    fn type_key(&self) -> Result<Self::Key, &'static str> {
        let custom_type = self.custom_type().ok_or("custom_type")?;
        let node_custom_type = self.node_custom_type().ok_or("node_custom_type")?;
        Ok((node_custom_type, custom_type))
    }
}

impl ClassInfo for dyn TagClass {
    type Key = (CustomType, CustomType, CustomType);
    const KIND: EntityKind = EntityKind::Tag;

    fn class_name(&self) -> &'static str {
        self.name()
    }

    fn base_name(&self) -> Option<&'static str> {
        self.extends()
    }

    fn type_key(&self) -> Result<Self::Key, &'static str> {
        let custom_type = self.custom_type().ok_or("custom_type")?;
        let tag_group_custom_type = self
            .tag_group_custom_type()
            .ok_or("tag_group_custom_type")?;
        let node_custom_type = self.node_custom_type().ok_or("node_custom_type")?;
        Ok((node_custom_type, tag_group_custom_type, custom_type))
    }
}

impl ClassInfo for dyn LayerClass {
    type Key = (CustomType, CustomType);
    const KIND: EntityKind = EntityKind::Layer;

    fn class_name(&self) -> &'static str {
        self.name()
    }

    fn base_name(&self) -> Option<&'static str> {
        self.extends()
    }

    fn type_key(&self) -> Result<Self::Key, &'static str> {
        let custom_type = self.custom_type().ok_or("custom_type")?;
        let node_custom_type = self.node_custom_type().ok_or("node_custom_type")?;
        Ok((node_custom_type, custom_type))
    }
}

// ClassTable

pub(crate) struct ClassTable<C: ?Sized + ClassInfo> {
    classes: HashMap<&'static str, Arc<C>>,
    /// Classes refining nothing, in registration order
    roots: Vec<&'static str>,
    /// base -> the one class refining it
    derived: HashMap<&'static str, &'static str>,
    cache: HashMap<C::Key, Arc<C>>,
    fallback: Arc<C>,
}

impl<C: ?Sized + ClassInfo> ClassTable<C> {
    pub fn new(fallback: Arc<C>) -> Self {
        Self {
            classes: HashMap::new(),
            roots: Vec::new(),
            derived: HashMap::new(),
            cache: HashMap::new(),
            fallback,
        }
    }

    pub fn register(&mut self, class: Arc<C>) -> Result<(), RegistryError> {
        let kind = C::KIND;
        let name = class.class_name();
        let key = class
            .type_key()
            .map_err(|attribute| RegistryError::MissingTypeAttribute {
                kind,
                class: name,
                attribute,
            })?;

        if self.classes.contains_key(name) {
            return Err(RegistryError::DuplicateClassName { kind, class: name });
        }

        match class.base_name() {
            None => {
                if let Some(existing) = self.find_root(key) {
                    return Err(RegistryError::DuplicateTypeKey {
                        kind,
                        class: name,
                        existing,
                    });
                }
                self.roots.push(name);
            }
            Some(base) => {
                let Some(base_class) = self.classes.get(base) else {
                    return Err(RegistryError::UnknownBaseClass {
                        kind,
                        class: name,
                        base,
                    });
                };
                if base_class.type_key() != Ok(key) {
                    return Err(RegistryError::KeyMismatch {
                        kind,
                        class: name,
                        base,
                    });
                }
                if let Some(existing) = self.derived.get(base) {
                    return Err(RegistryError::AlreadyExtended {
                        kind,
                        base,
                        existing: *existing,
                        class: name,
                    });
                }
                self.derived.insert(base, name);
            }
        }

        self.classes.insert(name, class);
        self.cache.clear();
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<C>> {
        self.classes.get(name).cloned()
    }

    pub fn resolve(&mut self, key: C::Key) -> Arc<C> {
        if let Some(class) = self.cache.get(&key) {
            return class.clone();
        }

        let class = match self.find_root(key) {
            Some(root) => {
                let mut name = root;
                while let Some(next) = self.derived.get(name) {
                    name = *next;
                }
                match self.classes.get(name) {
                    Some(class) => class.clone(),
                    None => panic!("Registered class {} is missing from its table", name),
                }
            }
            None => self.fallback.clone(),
        };

        self.cache.insert(key, class.clone());
        class
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    fn find_root(&self, key: C::Key) -> Option<&'static str> {
        self.roots.iter().copied().find(|name| {
            self.classes
                .get(*name)
                .is_some_and(|class| class.type_key() == Ok(key))
        })
    }
}

// ClassRegistry

/// Every class the application knows about, built once at startup and handed
/// to [`Session::new`].
pub struct ClassRegistry {
    nodes: ClassTable<dyn NodeClass>,
    tag_groups: ClassTable<dyn TagGroupClass>,
    tags: ClassTable<dyn TagClass>,
    layers: ClassTable<dyn LayerClass>,
}

impl Default for ClassRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassRegistry {
    pub fn new() -> Self {
        let base_node: Arc<dyn NodeClass> = Arc::new(BaseNode);
        let base_tag_group: Arc<dyn TagGroupClass> = Arc::new(BaseTagGroup);
        let base_tag: Arc<dyn TagClass> = Arc::new(BaseTag);
        let base_layer: Arc<dyn LayerClass> = Arc::new(BaseLayer);

        Self {
            nodes: ClassTable::new(base_node),
            tag_groups: ClassTable::new(base_tag_group),
            tags: ClassTable::new(base_tag),
            layers: ClassTable::new(base_layer),
        }
    }

    pub fn register_node(&mut self, class: impl NodeClass) -> Result<(), RegistryError> {
        let class: Arc<dyn NodeClass> = Arc::new(class);
        self.nodes.register(class)
    }

    pub fn register_tag_group(&mut self, class: impl TagGroupClass) -> Result<(), RegistryError> {
        let class: Arc<dyn TagGroupClass> = Arc::new(class);
        self.tag_groups.register(class)
    }

    pub fn register_tag(&mut self, class: impl TagClass) -> Result<(), RegistryError> {
        let class: Arc<dyn TagClass> = Arc::new(class);
        self.tags.register(class)
    }

    pub fn register_layer(&mut self, class: impl LayerClass) -> Result<(), RegistryError> {
        let class: Arc<dyn LayerClass> = Arc::new(class);
        self.layers.register(class)
    }

    pub fn node_class(&self, name: &str) -> Option<Arc<dyn NodeClass>> {
        self.nodes.get(name)
    }

    pub fn tag_group_class(&self, name: &str) -> Option<Arc<dyn TagGroupClass>> {
        self.tag_groups.get(name)
    }

    pub fn tag_class(&self, name: &str) -> Option<Arc<dyn TagClass>> {
        self.tags.get(name)
    }

    pub fn layer_class(&self, name: &str) -> Option<Arc<dyn LayerClass>> {
        self.layers.get(name)
    }

    pub fn resolve_node(&mut self, custom_type: CustomType) -> Arc<dyn NodeClass> {
        self.nodes.resolve(custom_type)
    }

    pub fn resolve_tag_group(
        &mut self,
        node_custom_type: CustomType,
        custom_type: CustomType,
    ) -> Arc<dyn TagGroupClass> {
        self.tag_groups.resolve((node_custom_type, custom_type))
    }

    pub fn resolve_tag(
        &mut self,
        node_custom_type: CustomType,
        tag_group_custom_type: CustomType,
        custom_type: CustomType,
    ) -> Arc<dyn TagClass> {
        self.tags
            .resolve((node_custom_type, tag_group_custom_type, custom_type))
    }

    pub fn resolve_layer(
        &mut self,
        node_custom_type: CustomType,
        custom_type: CustomType,
    ) -> Arc<dyn LayerClass> {
        self.layers.resolve((node_custom_type, custom_type))
    }

    /// Number of registered classes, all kinds together.
    pub fn len(&self) -> usize {
        self.nodes.len() + self.tag_groups.len() + self.tags.len() + self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
