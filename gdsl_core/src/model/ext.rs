use crate::DslResult;
use crate::FileId;
use crate::Project;
use crate::Value;

use super::Holder;
use super::PropertyModel;
use super::find_blocks;
use super::unique;

/// Extra properties: `ext { name = value }` blocks and `ext.name = value`
/// statements.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtModel {
	file: FileId,
	/// Path of the `ext` block, ending in `ext`.
	path: Vec<String>,
}

impl ExtModel {
	pub(crate) fn new(file: FileId, scope: &[&str]) -> Self {
		let mut path: Vec<String> = scope.iter().map(ToString::to_string).collect();
		path.push("ext".to_string());
		Self { file, path }
	}

	pub fn property(&self, name: &str) -> PropertyModel {
		PropertyModel::new(self.file, Holder::Path(self.path.clone()), name)
	}

	/// Declared property names in declaration order. A name declared more
	/// than once is listed once.
	pub fn properties(&self, project: &Project) -> Vec<String> {
		let tree = project.file(self.file).tree();
		let Some((ext, scope)) = self.path.split_last() else {
			return Vec::new();
		};

		let mut names = Vec::new();
		for holder in find_blocks(tree, tree.root(), scope) {
			for child in tree.children(holder) {
				let element = tree.get(*child);
				let segments = element.segments();
				match segments.split_first() {
					Some((head, [])) if head == ext && element.kind.is_block() => {
						names.extend(
							tree.children(*child)
								.iter()
								.map(|inner| tree.get(*inner).name.clone()),
						);
					}
					Some((head, rest)) if head == ext && !rest.is_empty() => {
						names.push(rest.join("."));
					}
					_ => {}
				}
			}
		}

		unique(names)
	}

	/// Set `name` to `value`, adding it to the last `ext` block when it is
	/// not declared yet.
	pub fn set(&self, project: &mut Project, name: &str, value: impl Into<Value>) -> DslResult<()> {
		self.property(name).set_value(project, value)
	}
}
